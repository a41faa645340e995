use serde::Serialize;

use crate::models::{Channel, CoreError, PinKey, Version, VersionAndChannel};

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct InstalledPackageVersion {
    pub package_id: String,
    pub version: Version,
    pub channel: Channel,
    /// Set when the installed manifest asks to only be upgraded on request.
    pub requires_explicit_upgrade: bool,
}

impl InstalledPackageVersion {
    pub fn new(package_id: impl Into<String>, version: impl Into<Version>) -> Self {
        Self {
            package_id: package_id.into(),
            version: version.into(),
            channel: Channel::default(),
            requires_explicit_upgrade: false,
        }
    }

    pub fn with_channel(mut self, channel: Channel) -> Self {
        self.channel = channel;
        self
    }

    pub fn with_explicit_upgrade(mut self, requires_explicit_upgrade: bool) -> Self {
        self.requires_explicit_upgrade = requires_explicit_upgrade;
        self
    }

    pub fn version_and_channel(&self) -> VersionAndChannel {
        VersionAndChannel::new(self.version.clone(), self.channel.clone())
    }
}

/// Identifies one entry of an [`AvailableVersions`] collection by its source,
/// raw version string and channel. An empty channel is the stable channel,
/// not a wildcard.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct PackageVersionKey {
    pub source_id: String,
    pub version: String,
    pub channel: String,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct AvailablePackageVersion {
    pub package_id: String,
    pub source_id: String,
    pub version: Version,
    pub channel: Channel,
}

impl AvailablePackageVersion {
    pub fn new(
        package_id: impl Into<String>,
        source_id: impl Into<String>,
        version: impl Into<Version>,
    ) -> Self {
        Self {
            package_id: package_id.into(),
            source_id: source_id.into(),
            version: version.into(),
            channel: Channel::default(),
        }
    }

    pub fn with_channel(mut self, channel: Channel) -> Self {
        self.channel = channel;
        self
    }

    pub fn key(&self) -> PackageVersionKey {
        PackageVersionKey {
            source_id: self.source_id.clone(),
            version: self.version.as_str().to_string(),
            channel: self.channel.as_str().to_string(),
        }
    }

    pub fn pin_key(&self) -> Result<PinKey, CoreError> {
        PinKey::new(self.package_id.as_str(), self.source_id.as_str())
    }

    pub fn version_and_channel(&self) -> VersionAndChannel {
        VersionAndChannel::new(self.version.clone(), self.channel.clone())
    }

    fn is_keyed_by(&self, key: &PackageVersionKey) -> bool {
        key.source_id == self.source_id
            && key.version == self.version.as_str()
            && key.channel == self.channel.as_str()
    }

    fn matches(&self, key: &PackageVersionKey) -> bool {
        (key.source_id.is_empty() || key.source_id == self.source_id)
            && (key.version.is_empty() || Version::parse(&key.version) == self.version)
            && (key.channel.is_empty() || key.channel == self.channel.as_str())
    }
}

/// The versions of one package offered by its sources.
///
/// `version_keys` is ordered latest first; equal versions keep the order in
/// which their sources reported them.
pub trait AvailableVersions {
    fn version_keys(&self) -> Vec<PackageVersionKey>;

    fn version(&self, key: &PackageVersionKey) -> Option<AvailablePackageVersion>;

    fn latest_version(&self) -> Option<AvailablePackageVersion>;
}

/// Picks the installer a candidate version would be installed with on this
/// system, if any is compatible.
pub trait InstallerComparator {
    type Installer;

    fn preferred_installer(&self, candidate: &AvailablePackageVersion) -> Option<Self::Installer>;
}

#[derive(Clone, Debug, Default)]
pub struct VersionCollection {
    versions: Vec<AvailablePackageVersion>,
}

impl VersionCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, version: AvailablePackageVersion) {
        let position = self
            .versions
            .iter()
            .position(|existing| existing.version < version.version)
            .unwrap_or(self.versions.len());
        self.versions.insert(position, version);
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AvailablePackageVersion> {
        self.versions.iter()
    }

    /// Latest entry matching `pattern`, where empty fields match anything and
    /// versions compare by value (`2.0` finds `2.0.0`).
    pub fn find_matching(&self, pattern: &PackageVersionKey) -> Option<&AvailablePackageVersion> {
        self.versions.iter().find(|version| version.matches(pattern))
    }
}

impl FromIterator<AvailablePackageVersion> for VersionCollection {
    fn from_iter<T: IntoIterator<Item = AvailablePackageVersion>>(iter: T) -> Self {
        let mut collection = Self::new();
        for version in iter {
            collection.push(version);
        }
        collection
    }
}

impl AvailableVersions for VersionCollection {
    fn version_keys(&self) -> Vec<PackageVersionKey> {
        self.versions
            .iter()
            .map(AvailablePackageVersion::key)
            .collect()
    }

    fn version(&self, key: &PackageVersionKey) -> Option<AvailablePackageVersion> {
        self.versions
            .iter()
            .find(|version| version.is_keyed_by(key))
            .cloned()
    }

    fn latest_version(&self) -> Option<AvailablePackageVersion> {
        self.versions.first().cloned()
    }
}
