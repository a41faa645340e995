pub mod error;
pub mod gated_version;
pub mod package;
pub mod pin;
pub mod version;

pub use error::{CoreError, CoreErrorKind};
pub use gated_version::GatedVersion;
pub use package::{
    AvailablePackageVersion, AvailableVersions, InstalledPackageVersion, InstallerComparator,
    PackageVersionKey, VersionCollection,
};
pub use pin::{INSTALLED_SOURCE_ID, Pin, PinBehavior, PinKey, PinType};
pub use version::{Channel, Version, VersionAndChannel, VersionPart};
