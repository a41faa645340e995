use std::collections::HashMap;

use crate::models::{
    AvailablePackageVersion, AvailableVersions, GatedVersion, InstalledPackageVersion, Pin,
    PinBehavior, PinKey, PinType, Version, VersionAndChannel,
};
use crate::persistence::PinStore;

/// Decides how pins restrict the available versions of one package relative
/// to its installed version.
///
/// Pins only mean something against an installed package, so an evaluator
/// built with [`PinBehavior::IgnorePins`] or without an installed version
/// never consults the store and reports every version as unpinned.
pub struct PinEvaluator<'a> {
    behavior: PinBehavior,
    store: Option<&'a dyn PinStore>,
    installed: Option<VersionAndChannel>,
    installed_pin: Option<Pin>,
    pinned_by_manifest: bool,
    available_pins: HashMap<PinKey, Option<Pin>>,
}

impl<'a> PinEvaluator<'a> {
    pub fn new(
        behavior: PinBehavior,
        store: Option<&'a dyn PinStore>,
        installed: Option<&InstalledPackageVersion>,
    ) -> Self {
        let store = match (behavior, installed) {
            (PinBehavior::IgnorePins, _) | (_, None) => None,
            _ => store,
        };

        let installed_pin = match (store, installed) {
            (Some(store), Some(installed)) => lookup_installed_pin(store, installed),
            _ => None,
        };

        let pinned_by_manifest =
            store.is_some() && installed.is_some_and(|installed| installed.requires_explicit_upgrade);

        Self {
            behavior,
            store,
            installed: installed.map(InstalledPackageVersion::version_and_channel),
            installed_pin,
            pinned_by_manifest,
            available_pins: HashMap::new(),
        }
    }

    pub fn behavior(&self) -> PinBehavior {
        self.behavior
    }

    /// Whether this evaluator consults pins at all.
    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    pub fn installed_pin(&self) -> Option<&Pin> {
        self.installed_pin.as_ref()
    }

    /// The effective pin type for `candidate`: the stricter of what its own
    /// source pin and the installed package's pin say about it.
    pub fn evaluate_pin_type(&mut self, candidate: Option<&AvailablePackageVersion>) -> PinType {
        let (Some(store), Some(candidate)) = (self.store, candidate) else {
            return PinType::Unknown;
        };

        let available_pin = self.available_pin(store, candidate);

        let from_available =
            evaluate_pinned_state_for_version(&candidate.version, available_pin.as_ref(), self.behavior);
        let from_installed = evaluate_pinned_state_for_version(
            &candidate.version,
            self.installed_pin.as_ref(),
            self.behavior,
        );
        let from_manifest = if self.pinned_by_manifest {
            pinned_state(PinType::PinnedByManifest, None, &candidate.version, self.behavior)
        } else {
            PinType::Unknown
        };

        from_available
            .stricter(from_installed)
            .stricter(from_manifest)
    }

    /// Whether `candidate` is a strict update over the installed version on
    /// the same channel.
    pub fn is_update(&self, candidate: Option<&AvailablePackageVersion>) -> bool {
        match (&self.installed, candidate) {
            (Some(installed), Some(candidate)) => {
                installed.is_updated_by(&candidate.version_and_channel())
            }
            _ => false,
        }
    }

    /// The first version, latest first, that no pin holds back. `None` means
    /// every available version is pinned out.
    pub fn latest_available_version_for_pins(
        &mut self,
        versions: &dyn AvailableVersions,
    ) -> Option<AvailablePackageVersion> {
        if self.store.is_none() {
            return versions.latest_version();
        }

        for key in versions.version_keys() {
            let Some(candidate) = versions.version(&key) else {
                continue;
            };
            if self.evaluate_pin_type(Some(&candidate)) == PinType::Unknown {
                return Some(candidate);
            }
        }

        None
    }

    fn available_pin(
        &mut self,
        store: &dyn PinStore,
        candidate: &AvailablePackageVersion,
    ) -> Option<Pin> {
        let key = match candidate.pin_key() {
            Ok(key) => key,
            Err(error) => {
                tracing::warn!(
                    source_id = %candidate.source_id,
                    message = %error.message,
                    "available version has no usable pin key"
                );
                return None;
            }
        };

        if let Some(cached) = self.available_pins.get(&key) {
            return cached.clone();
        }

        let pin = match store.get_pin(&key) {
            Ok(pin) => pin,
            Err(error) => {
                tracing::warn!(
                    key = %key,
                    kind = ?error.kind,
                    message = %error.message,
                    "failed to read pin; treating version as unpinned"
                );
                None
            }
        };
        self.available_pins.insert(key, pin.clone());
        pin
    }
}

/// What a single pin says about `version` under `behavior`.
///
/// Blocking pins cannot be bypassed by any behavior. Pinning pins are
/// bypassed by [`PinBehavior::IncludePinned`]. Gating pins only hold back
/// versions outside their range. [`PinBehavior::IgnorePins`] is honored by
/// [`PinEvaluator`], which never looks pins up under it.
pub fn evaluate_pinned_state_for_version(
    version: &Version,
    pin: Option<&Pin>,
    behavior: PinBehavior,
) -> PinType {
    match pin {
        Some(pin) => pinned_state(pin.pin_type(), Some(pin.gated_version()), version, behavior),
        None => PinType::Unknown,
    }
}

fn pinned_state(
    pin_type: PinType,
    gated_version: Option<&GatedVersion>,
    version: &Version,
    behavior: PinBehavior,
) -> PinType {
    match pin_type {
        PinType::Blocking => PinType::Blocking,
        PinType::Pinning | PinType::PinnedByManifest if behavior != PinBehavior::IncludePinned => {
            pin_type
        }
        PinType::Gating
            if !gated_version.is_some_and(|gate| gate.is_valid_version(version)) =>
        {
            PinType::Gating
        }
        _ => PinType::Unknown,
    }
}

fn lookup_installed_pin(store: &dyn PinStore, installed: &InstalledPackageVersion) -> Option<Pin> {
    let key = match PinKey::installed(installed.package_id.as_str()) {
        Ok(key) => key,
        Err(error) => {
            tracing::warn!(
                message = %error.message,
                "installed package has no usable pin key"
            );
            return None;
        }
    };

    match store.get_pin(&key) {
        Ok(pin) => pin,
        Err(error) => {
            tracing::warn!(
                key = %key,
                kind = ?error.kind,
                message = %error.message,
                "failed to read installed pin; treating package as unpinned"
            );
            None
        }
    }
}
