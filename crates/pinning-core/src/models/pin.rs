use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::models::{CoreError, CoreErrorKind, GatedVersion};

/// Source id reserved for pins placed on the installed package itself.
pub const INSTALLED_SOURCE_ID: &str = "*";

/// Pin types, declared from least to most strict. The declaration order is
/// the persisted ordinal and the strictness order.
#[derive(
    Clone, Copy, Debug, Default, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PinType {
    #[default]
    Unknown,
    PinnedByManifest,
    Pinning,
    Gating,
    Blocking,
}

impl PinType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::PinnedByManifest => "pinned_by_manifest",
            Self::Pinning => "pinning",
            Self::Gating => "gating",
            Self::Blocking => "blocking",
        }
    }

    pub fn ordinal(self) -> i64 {
        match self {
            Self::Unknown => 0,
            Self::PinnedByManifest => 1,
            Self::Pinning => 2,
            Self::Gating => 3,
            Self::Blocking => 4,
        }
    }

    pub fn from_ordinal(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Unknown),
            1 => Some(Self::PinnedByManifest),
            2 => Some(Self::Pinning),
            3 => Some(Self::Gating),
            4 => Some(Self::Blocking),
            _ => None,
        }
    }

    pub fn stricter(self, other: PinType) -> PinType {
        self.max(other)
    }
}

impl Display for PinType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PinType {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "unknown" => Ok(Self::Unknown),
            "pinned_by_manifest" => Ok(Self::PinnedByManifest),
            "pinning" => Ok(Self::Pinning),
            "gating" => Ok(Self::Gating),
            "blocking" => Ok(Self::Blocking),
            _ => Err(()),
        }
    }
}

/// How stored pins affect a single evaluation.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum PinBehavior {
    /// Pins have no effect at all.
    IgnorePins,
    /// Plain pinning pins are bypassed; blocking and gating pins still apply.
    IncludePinned,
    #[default]
    ConsiderPins,
}

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize)]
pub struct PinKey {
    package_id: String,
    source_id: String,
}

impl PinKey {
    pub fn new(
        package_id: impl Into<String>,
        source_id: impl Into<String>,
    ) -> Result<Self, CoreError> {
        let package_id = package_id.into();
        if package_id.trim().is_empty() {
            return Err(CoreError::new(
                CoreErrorKind::InvalidInput,
                "pin key requires a non-empty package id",
            ));
        }

        Ok(Self {
            package_id,
            source_id: source_id.into(),
        })
    }

    /// Key for a pin on the installed package rather than on any source.
    pub fn installed(package_id: impl Into<String>) -> Result<Self, CoreError> {
        Self::new(package_id, INSTALLED_SOURCE_ID)
    }

    pub fn package_id(&self) -> &str {
        &self.package_id
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn is_installed(&self) -> bool {
        self.source_id == INSTALLED_SOURCE_ID
    }
}

impl Display for PinKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]", self.package_id, self.source_id)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Pin {
    #[serde(rename = "type")]
    pin_type: PinType,
    key: PinKey,
    #[serde(skip_serializing_if = "GatedVersion::is_empty")]
    gated_version: GatedVersion,
}

impl Pin {
    pub fn create_blocking_pin(key: PinKey) -> Self {
        Self {
            pin_type: PinType::Blocking,
            key,
            gated_version: GatedVersion::default(),
        }
    }

    pub fn create_pinning_pin(key: PinKey) -> Self {
        Self {
            pin_type: PinType::Pinning,
            key,
            gated_version: GatedVersion::default(),
        }
    }

    pub fn create_gating_pin(key: PinKey, gated_version: GatedVersion) -> Result<Self, CoreError> {
        if gated_version.is_empty() {
            return Err(CoreError::new(
                CoreErrorKind::InvalidInput,
                format!("gating pin for '{key}' requires a gated version"),
            ));
        }

        Ok(Self {
            pin_type: PinType::Gating,
            key,
            gated_version,
        })
    }

    /// Rebuilds a pin from its persisted columns, rejecting combinations the
    /// factories could not have produced.
    pub(crate) fn from_parts(
        pin_type: PinType,
        key: PinKey,
        gated_version: &str,
    ) -> Result<Self, CoreError> {
        match pin_type {
            PinType::Blocking => Ok(Self::create_blocking_pin(key)),
            PinType::Pinning => Ok(Self::create_pinning_pin(key)),
            PinType::Gating => Self::create_gating_pin(key, GatedVersion::parse(gated_version)?),
            PinType::Unknown | PinType::PinnedByManifest => Err(CoreError::new(
                CoreErrorKind::InvalidInput,
                format!("pin type '{pin_type}' cannot be stored for '{key}'"),
            )),
        }
    }

    pub fn pin_type(&self) -> PinType {
        self.pin_type
    }

    pub fn key(&self) -> &PinKey {
        &self.key
    }

    pub fn gated_version(&self) -> &GatedVersion {
        &self.gated_version
    }
}

impl Display for Pin {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Pin {{ {}, {}", self.pin_type, self.key)?;
        if !self.gated_version.is_empty() {
            write!(f, ", {}", self.gated_version)?;
        }
        f.write_str(" }")
    }
}
