use std::path::Path;

use anyhow::{Context, Result, bail};
use pinning_core::models::{
    AvailablePackageVersion, Channel, CoreErrorKind, GatedVersion, InstalledPackageVersion,
    InstallerComparator, Pin, PinKey, VersionCollection,
};
use pinning_core::{
    LatestApplicableVersionSelector, PinRepository, PinStore, RepositoryDisposition,
};
use serde::Serialize;

/// Treats every candidate as installable; the command line has no installer
/// metadata to compare.
struct AnyInstaller;

impl InstallerComparator for AnyInstaller {
    type Installer = ();

    fn preferred_installer(&self, _candidate: &AvailablePackageVersion) -> Option<()> {
        Some(())
    }
}

#[derive(Serialize)]
struct PinRow<'a> {
    package_id: &'a str,
    source_id: &'a str,
    pin_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    gated_version: Option<&'a str>,
}

impl<'a> From<&'a Pin> for PinRow<'a> {
    fn from(pin: &'a Pin) -> Self {
        let gate = pin.gated_version();
        Self {
            package_id: pin.key().package_id(),
            source_id: pin.key().source_id(),
            pin_type: pin.pin_type().as_str(),
            gated_version: (!gate.is_empty()).then(|| gate.as_str()),
        }
    }
}

fn open_repository(store: Option<&Path>, disposition: RepositoryDisposition) -> PinRepository {
    let repository = match store {
        Some(path) => PinRepository::open_at(path, disposition),
        None => PinRepository::open(disposition),
    };
    tracing::debug!(
        disposition = ?disposition,
        connected = repository.is_connected(),
        path = ?repository.store().map(|store| store.database_path()),
        "opened pin repository"
    );
    repository
}

fn open_for_write(store: Option<&Path>) -> Result<PinRepository> {
    let repository = open_repository(store, RepositoryDisposition::ReadWrite);
    if !repository.is_connected() {
        bail!("Could not open the pin store for writing");
    }
    Ok(repository)
}

pub fn cmd_add(
    store: Option<&Path>,
    package_id: &str,
    source: Option<&str>,
    installed: bool,
    blocking: bool,
    gate: Option<&str>,
    force: bool,
) -> Result<()> {
    let key = if installed {
        PinKey::installed(package_id)?
    } else {
        PinKey::new(package_id, source.unwrap_or_default())?
    };

    let pin = match (blocking, gate) {
        (true, _) => Pin::create_blocking_pin(key),
        (false, Some(gate)) => {
            let gate = GatedVersion::parse(gate)
                .with_context(|| format!("Invalid version gate '{gate}'"))?;
            Pin::create_gating_pin(key, gate)?
        }
        (false, None) => Pin::create_pinning_pin(key),
    };

    let repository = open_for_write(store)?;
    match repository.get_pin(pin.key())? {
        Some(existing) if existing == pin => {
            println!("Pin already exists: {pin}");
            return Ok(());
        }
        Some(existing) if !force => {
            bail!("A different pin already exists: {existing} (use --force to replace it)");
        }
        Some(_) => {
            repository.add_or_update_pin(&pin)?;
            println!("Replaced pin: {pin}");
        }
        None => {
            repository.add_pin(&pin)?;
            println!("Added pin: {pin}");
        }
    }

    Ok(())
}

pub fn cmd_remove(store: Option<&Path>, package_id: &str, source: Option<&str>) -> Result<()> {
    let repository = open_for_write(store)?;

    let keys: Vec<PinKey> = match source {
        Some(source) => vec![PinKey::new(package_id, source)?],
        None => repository
            .get_all_pins()?
            .into_iter()
            .filter(|pin| pin.key().package_id() == package_id)
            .map(|pin| pin.key().clone())
            .collect(),
    };

    let mut removed = 0;
    for key in &keys {
        match repository.remove_pin(key) {
            Ok(()) => {
                println!("Removed pin: {key}");
                removed += 1;
            }
            Err(error) if error.kind == CoreErrorKind::NotFound => {}
            Err(error) => return Err(error.into()),
        }
    }

    if removed == 0 {
        bail!("No pins found for '{package_id}'");
    }
    Ok(())
}

pub fn cmd_list(store: Option<&Path>, source: Option<&str>, json: bool) -> Result<()> {
    let repository = open_repository(store, RepositoryDisposition::ReadOnly);
    let pins: Vec<Pin> = repository
        .get_all_pins()?
        .into_iter()
        .filter(|pin| source.is_none_or(|source| pin.key().source_id() == source))
        .collect();

    if json {
        let rows: Vec<PinRow<'_>> = pins.iter().map(PinRow::from).collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    print_pins(&pins);
    Ok(())
}

pub fn cmd_reset(store: Option<&Path>, source: Option<&str>, force: bool) -> Result<()> {
    if !force {
        let repository = open_repository(store, RepositoryDisposition::ReadOnly);
        let pins: Vec<Pin> = repository
            .get_all_pins()?
            .into_iter()
            .filter(|pin| source.is_none_or(|source| pin.key().source_id() == source))
            .collect();
        print_pins(&pins);
        if !pins.is_empty() {
            println!();
            println!("Run again with --force to remove these pins.");
        }
        return Ok(());
    }

    let repository = open_for_write(store)?;
    if repository.reset_all_pins(source.unwrap_or_default())? {
        println!("Pins reset");
    } else {
        println!("No pins to reset");
    }
    Ok(())
}

pub fn cmd_check(
    store: Option<&Path>,
    package_id: &str,
    source: &str,
    installed_version: Option<&str>,
    channel: &str,
    available: &[String],
) -> Result<()> {
    let repository = open_repository(store, RepositoryDisposition::ReadOnly);

    let versions: VersionCollection = available
        .iter()
        .map(|version| {
            AvailablePackageVersion::new(package_id, source, version.as_str())
                .with_channel(Channel::new(channel))
        })
        .collect();
    let installed = installed_version.map(|version| {
        InstalledPackageVersion::new(package_id, version).with_channel(Channel::new(channel))
    });

    let selector = LatestApplicableVersionSelector::new(Some(&repository), &AnyInstaller);
    let selected = selector.select(installed.as_ref(), &versions);

    match (selected.version, installed) {
        (Some(version), Some(installed)) if selected.update_available => {
            println!(
                "{package_id}: update available {} -> {}",
                installed.version, version.version
            );
        }
        (Some(version), _) => println!("{package_id}: latest applicable version {}", version.version),
        (None, Some(installed)) => {
            println!("{package_id}: no applicable update for {}", installed.version)
        }
        (None, None) => println!("{package_id}: no applicable version"),
    }
    Ok(())
}

fn print_pins(pins: &[Pin]) {
    if pins.is_empty() {
        println!("No pins");
        return;
    }

    let id_width = pins
        .iter()
        .map(|pin| pin.key().package_id().len())
        .max()
        .unwrap_or(0)
        .max("Package".len());
    let source_width = pins
        .iter()
        .map(|pin| pin.key().source_id().len())
        .max()
        .unwrap_or(0)
        .max("Source".len());

    println!("{:<id_width$}  {:<source_width$}  {:<10}  Version", "Package", "Source", "Type");
    for pin in pins {
        println!(
            "{:<id_width$}  {:<source_width$}  {:<10}  {}",
            pin.key().package_id(),
            pin.key().source_id(),
            pin.pin_type().as_str(),
            pin.gated_version()
        );
    }
}
