//! Bundler resolver

use super::VersionResolver;
use crate::domain::PackageManager;

/// Resolves gems against RubyGems, private gem servers and git sources
#[derive(Debug, Clone, Copy, Default)]
pub struct BundlerResolver;

impl BundlerResolver {
    pub fn new() -> Self {
        Self
    }
}

impl VersionResolver for BundlerResolver {
    fn package_manager(&self) -> PackageManager {
        PackageManager::Bundler
    }
}
