use crate::evaluation::PinEvaluator;
use crate::models::{
    AvailablePackageVersion, AvailableVersions, InstalledPackageVersion, InstallerComparator,
    PinBehavior, PinType,
};
use crate::persistence::PinStore;

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LatestApplicableVersion {
    pub version: Option<AvailablePackageVersion>,
    /// True only when a package is installed and `version` updates it.
    pub update_available: bool,
}

/// Finds the newest available version a package could move to, honoring
/// pins and installer compatibility.
pub struct LatestApplicableVersionSelector<'a, C> {
    store: Option<&'a dyn PinStore>,
    installers: &'a C,
    behavior: PinBehavior,
}

impl<'a, C: InstallerComparator> LatestApplicableVersionSelector<'a, C> {
    pub fn new(store: Option<&'a dyn PinStore>, installers: &'a C) -> Self {
        Self {
            store,
            installers,
            behavior: PinBehavior::ConsiderPins,
        }
    }

    pub fn with_behavior(mut self, behavior: PinBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    /// Walks `available` latest first and returns the first version that is
    /// an update (when something is installed), is not held back by a pin and
    /// has a compatible installer.
    pub fn select(
        &self,
        installed: Option<&InstalledPackageVersion>,
        available: &dyn AvailableVersions,
    ) -> LatestApplicableVersion {
        let mut evaluator = PinEvaluator::new(self.behavior, self.store, installed);

        for key in available.version_keys() {
            let Some(candidate) = available.version(&key) else {
                continue;
            };

            if installed.is_some() && !evaluator.is_update(Some(&candidate)) {
                continue;
            }

            let pin_type = evaluator.evaluate_pin_type(Some(&candidate));
            if pin_type != PinType::Unknown {
                tracing::debug!(
                    package_id = %candidate.package_id,
                    source_id = %candidate.source_id,
                    version = %candidate.version,
                    pin_type = %pin_type,
                    "skipping pinned version"
                );
                continue;
            }

            if self.installers.preferred_installer(&candidate).is_none() {
                tracing::debug!(
                    package_id = %candidate.package_id,
                    source_id = %candidate.source_id,
                    version = %candidate.version,
                    "skipping version without a compatible installer"
                );
                continue;
            }

            return LatestApplicableVersion {
                version: Some(candidate),
                update_available: installed.is_some(),
            };
        }

        LatestApplicableVersion::default()
    }
}
