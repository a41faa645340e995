use std::fmt::{Display, Formatter};

use rusqlite::{Connection, OptionalExtension, params};

use crate::models::{Pin, PinKey, PinType};
use crate::persistence::{PinUpdate, RowId};

#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub struct SchemaVersion {
    pub major: u32,
    pub minor: u32,
}

impl SchemaVersion {
    pub const V1_0: Self = Self { major: 1, minor: 0 };
    pub const LATEST: Self = Self::V1_0;

    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl Display for SchemaVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Table layout of a pin store, chosen from the version recorded in the file.
///
/// Every variant implements the full operation set; a new on-disk layout is a
/// new variant.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PinSchema {
    V1_0,
}

const SCHEMAS: [PinSchema; 1] = [PinSchema::V1_0];

const PIN_TABLE_1_0: &str = r#"
CREATE TABLE pin (
    package_id TEXT NOT NULL,
    source_id TEXT NOT NULL,
    type INTEGER NOT NULL,
    version TEXT NOT NULL
);

CREATE UNIQUE INDEX pin_pkgid_srcid_index ON pin (package_id, source_id);
"#;

impl PinSchema {
    pub fn all() -> &'static [PinSchema] {
        &SCHEMAS
    }

    /// Selects the layout able to read `version`. Only the major version
    /// decides; minor revisions keep the layout readable.
    pub fn for_version(version: SchemaVersion) -> Option<Self> {
        SCHEMAS
            .iter()
            .copied()
            .find(|schema| schema.version().major == version.major)
    }

    pub fn version(self) -> SchemaVersion {
        match self {
            Self::V1_0 => SchemaVersion::V1_0,
        }
    }

    /// Whether this build may write to a store recorded at `version`.
    pub fn can_write(self, version: SchemaVersion) -> bool {
        let own = self.version();
        own.major == version.major && version.minor <= own.minor
    }

    pub fn create_sql(self) -> &'static str {
        match self {
            Self::V1_0 => PIN_TABLE_1_0,
        }
    }

    pub(crate) fn create_tables(self, connection: &Connection) -> rusqlite::Result<()> {
        connection.execute_batch(self.create_sql())
    }

    /// Returns `None` when a row for the key already exists.
    pub(crate) fn add_pin(self, connection: &Connection, pin: &Pin) -> rusqlite::Result<Option<RowId>> {
        match self {
            Self::V1_0 => {
                if find_row_id(connection, pin.key())?.is_some() {
                    return Ok(None);
                }

                connection.execute(
                    "INSERT INTO pin (package_id, source_id, type, version) VALUES (?1, ?2, ?3, ?4)",
                    params![
                        pin.key().package_id(),
                        pin.key().source_id(),
                        pin.pin_type().ordinal(),
                        pin.gated_version().as_str(),
                    ],
                )?;
                Ok(Some(RowId(connection.last_insert_rowid())))
            }
        }
    }

    /// Returns `None` when no row exists for the key.
    pub(crate) fn update_pin(
        self,
        connection: &Connection,
        pin: &Pin,
    ) -> rusqlite::Result<Option<PinUpdate>> {
        match self {
            Self::V1_0 => {
                let existing = connection
                    .query_row(
                        "SELECT rowid, type, version FROM pin WHERE package_id = ?1 AND source_id = ?2",
                        params![pin.key().package_id(), pin.key().source_id()],
                        |row| {
                            Ok((
                                row.get::<_, i64>(0)?,
                                row.get::<_, i64>(1)?,
                                row.get::<_, String>(2)?,
                            ))
                        },
                    )
                    .optional()?;

                let Some((row_id, stored_type, stored_version)) = existing else {
                    return Ok(None);
                };

                let new_type = pin.pin_type().ordinal();
                let new_version = pin.gated_version().as_str();
                if stored_type == new_type && stored_version == new_version {
                    return Ok(Some(PinUpdate {
                        changed: false,
                        row_id: RowId(row_id),
                    }));
                }

                connection.execute(
                    "UPDATE pin SET type = ?1, version = ?2 WHERE rowid = ?3",
                    params![new_type, new_version, row_id],
                )?;
                Ok(Some(PinUpdate {
                    changed: true,
                    row_id: RowId(row_id),
                }))
            }
        }
    }

    /// Returns `false` when no row exists for the key.
    pub(crate) fn remove_pin(self, connection: &Connection, key: &PinKey) -> rusqlite::Result<bool> {
        match self {
            Self::V1_0 => {
                let Some(row_id) = find_row_id(connection, key)? else {
                    return Ok(false);
                };
                connection.execute("DELETE FROM pin WHERE rowid = ?1", [row_id.0])?;
                Ok(true)
            }
        }
    }

    pub(crate) fn get_pin(self, connection: &Connection, key: &PinKey) -> rusqlite::Result<Option<Pin>> {
        match self {
            Self::V1_0 => connection
                .query_row(
                    "SELECT type, version FROM pin WHERE package_id = ?1 AND source_id = ?2",
                    params![key.package_id(), key.source_id()],
                    |row| {
                        let type_ordinal: i64 = row.get(0)?;
                        let version: String = row.get(1)?;
                        rebuild_pin(type_ordinal, key.clone(), &version)
                    },
                )
                .optional(),
        }
    }

    pub(crate) fn get_all_pins(self, connection: &Connection) -> rusqlite::Result<Vec<Pin>> {
        match self {
            Self::V1_0 => {
                let mut statement = connection.prepare(
                    "SELECT package_id, source_id, type, version FROM pin ORDER BY rowid",
                )?;
                let rows = statement.query_map([], |row| {
                    let package_id: String = row.get(0)?;
                    let source_id: String = row.get(1)?;
                    let type_ordinal: i64 = row.get(2)?;
                    let version: String = row.get(3)?;

                    let key = PinKey::new(package_id, source_id)
                        .map_err(|error| invalid_row(&error.message))?;
                    rebuild_pin(type_ordinal, key, &version)
                })?;

                rows.collect()
            }
        }
    }

    pub(crate) fn reset_all_pins(self, connection: &Connection, source_id: &str) -> rusqlite::Result<bool> {
        match self {
            Self::V1_0 => {
                let removed = if source_id.is_empty() {
                    connection.execute("DELETE FROM pin", [])?
                } else {
                    connection.execute("DELETE FROM pin WHERE source_id = ?1", [source_id])?
                };
                Ok(removed > 0)
            }
        }
    }
}

fn find_row_id(connection: &Connection, key: &PinKey) -> rusqlite::Result<Option<RowId>> {
    connection
        .query_row(
            "SELECT rowid FROM pin WHERE package_id = ?1 AND source_id = ?2",
            params![key.package_id(), key.source_id()],
            |row| row.get::<_, i64>(0).map(RowId),
        )
        .optional()
}

fn rebuild_pin(type_ordinal: i64, key: PinKey, version: &str) -> rusqlite::Result<Pin> {
    let pin_type = PinType::from_ordinal(type_ordinal).ok_or_else(|| {
        invalid_row(&format!(
            "unknown pin type '{type_ordinal}' stored for '{key}'"
        ))
    })?;
    Pin::from_parts(pin_type, key, version).map_err(|error| invalid_row(&error.message))
}

fn invalid_row(message: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::other(message.to_string())),
    )
}
