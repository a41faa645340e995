use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

const SPLIT_CHAR: char = '.';

static ZERO_PART: VersionPart = VersionPart {
    integer: 0,
    other: String::new(),
    folded_other: String::new(),
};

/// One `.`-separated component of a [`Version`]: a leading integer plus any
/// trailing text (`"2-beta"` is `2` and `"-beta"`).
#[derive(Clone, Debug, Default)]
pub struct VersionPart {
    integer: u64,
    other: String,
    folded_other: String,
}

impl VersionPart {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let digits_end = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(trimmed.len());

        let (integer, other) = if digits_end == 0 {
            (0, trimmed)
        } else {
            match trimmed[..digits_end].parse::<u64>() {
                Ok(integer) => (integer, &trimmed[digits_end..]),
                Err(_) => (0, trimmed),
            }
        };

        Self::with_other(integer, other)
    }

    pub fn with_other(integer: u64, other: &str) -> Self {
        Self {
            integer,
            other: other.to_string(),
            folded_other: other.to_lowercase(),
        }
    }

    pub fn integer(&self) -> u64 {
        self.integer
    }

    pub fn other(&self) -> &str {
        &self.other
    }

    pub fn is_wildcard(&self) -> bool {
        self.integer == 0 && self.other == "*"
    }

    fn is_zero(&self) -> bool {
        self.integer == 0 && self.other.is_empty()
    }
}

impl From<u64> for VersionPart {
    fn from(integer: u64) -> Self {
        Self::with_other(integer, "")
    }
}

impl Ord for VersionPart {
    fn cmp(&self, other: &Self) -> Ordering {
        self.integer.cmp(&other.integer).then_with(|| {
            // A bare number sorts after the same number with a suffix.
            match (self.other.is_empty(), other.other.is_empty()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => self.folded_other.cmp(&other.folded_other),
            }
        })
    }
}

impl PartialOrd for VersionPart {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for VersionPart {
    fn eq(&self, other: &Self) -> bool {
        self.integer == other.integer && self.folded_other == other.folded_other
    }
}

impl Eq for VersionPart {}

/// A loosely structured, comparable version string.
///
/// Leading non-digit prefixes such as `v` are ignored, each part is compared
/// numerically and then by suffix, and trailing zero parts are insignificant,
/// so `v1.2.0` equals `1.2`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Version {
    raw: String,
    parts: Vec<VersionPart>,
}

impl Version {
    pub fn parse(value: &str) -> Self {
        let raw = value.trim().to_string();

        let mut base = raw.as_str();
        let digit_pos = base.find(|c: char| c.is_ascii_digit());
        let split_pos = base.find(SPLIT_CHAR);
        if let Some(digit_pos) = digit_pos
            && split_pos.is_none_or(|split_pos| digit_pos < split_pos)
        {
            base = &base[digit_pos..];
        }

        let mut parts: Vec<VersionPart> = if base.is_empty() {
            Vec::new()
        } else {
            base.split(SPLIT_CHAR).map(VersionPart::parse).collect()
        };

        while parts.last().is_some_and(VersionPart::is_zero) {
            parts.pop();
        }

        Self { raw, parts }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn parts(&self) -> &[VersionPart] {
        &self.parts
    }

    /// Returns the part at `index`, or the implied zero part past the end.
    pub fn part_at(&self, index: usize) -> &VersionPart {
        self.parts.get(index).unwrap_or(&ZERO_PART)
    }
}

impl From<&str> for Version {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl From<String> for Version {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<Version> for String {
    fn from(value: Version) -> Self {
        value.raw
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.parts.len().max(other.parts.len());
        (0..len)
            .map(|index| self.part_at(index).cmp(other.part_at(index)))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other).is_eq()
    }
}

impl Eq for Version {}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Channel(String);

impl Channel {
    pub fn new(channel: impl Into<String>) -> Self {
        Self(channel.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn matches(&self, other: &Channel) -> bool {
        self.0.to_lowercase() == other.0.to_lowercase()
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct VersionAndChannel {
    version: Version,
    channel: Channel,
}

impl VersionAndChannel {
    pub fn new(version: Version, channel: Channel) -> Self {
        Self { version, channel }
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Whether `other` is a strict update of `self`. Crossing channels is
    /// never an update.
    pub fn is_updated_by(&self, other: &VersionAndChannel) -> bool {
        if !self.channel.matches(&other.channel) {
            return false;
        }

        self.version < other.version
    }
}

impl Display for VersionAndChannel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.channel.as_str().is_empty() {
            write!(f, "{}", self.version)
        } else {
            write!(f, "{}[{}]", self.version, self.channel.as_str())
        }
    }
}
