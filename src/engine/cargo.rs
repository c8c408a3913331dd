//! Cargo resolver

use super::VersionResolver;
use crate::domain::PackageManager;

/// Resolves crates against crates.io and git sources using semver rules
#[derive(Debug, Clone, Copy, Default)]
pub struct CargoResolver;

impl CargoResolver {
    pub fn new() -> Self {
        Self
    }
}

impl VersionResolver for CargoResolver {
    fn package_manager(&self) -> PackageManager {
        PackageManager::Cargo
    }
}
