//! Version resolution engine
//!
//! The engine answers four questions about one dependency:
//! - the latest version (or commit) it could move to
//! - the lowest version that fixes every known advisory
//! - whether a given candidate version is installable
//! - the version the dependency graph settles on for a widened requirement
//!
//! Ecosystem behaviour lives behind `VersionResolver`; the shared
//! registry-and-filter flow is in `simple`.

mod bundler;
mod cargo;
mod pip;
mod simple;

pub use bundler::BundlerResolver;
pub use cargo::CargoResolver;
pub use pip::PipCompileResolver;

use crate::config::ResolverConfig;
use crate::domain::{
    Constraint, Credentials, Dependency, LatestVersion, PackageManager, ResolutionRequest,
    Version, VersionScheme, VersionSource,
};
use crate::error::ResolverError;
use crate::native::{minimal_file_set, HelperRunner, NativeResolverBridge, SystemHelperRunner};
use crate::registry::{create_adapter, GitRemote, HttpClient, RegistryClient, SystemGit};
use crate::update::{runtime_eligibility, runtime_version, CandidateFilter, Eligibility};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Per-ecosystem resolution behaviour.
///
/// The provided methods implement the registry-and-filter flow shared by
/// ecosystems that do not need full-graph resolution.
#[async_trait]
pub trait VersionResolver: Send + Sync {
    /// Ecosystem this resolver serves
    fn package_manager(&self) -> PackageManager;

    /// Latest version or commit the dependency could be updated to
    async fn latest_version(
        &self,
        context: &ResolutionContext,
    ) -> Result<Option<LatestVersion>, ResolverError> {
        simple::latest_version(context).await
    }

    /// Lowest version above the current one that no advisory flags
    async fn lowest_security_fix_version(
        &self,
        context: &ResolutionContext,
    ) -> Result<Option<Version>, ResolverError> {
        simple::lowest_security_fix_version(context).await
    }

    /// Whether `candidate` can be installed
    async fn is_resolvable(
        &self,
        context: &ResolutionContext,
        candidate: &Version,
    ) -> Result<bool, ResolverError> {
        simple::is_resolvable(context, candidate)
    }

    /// Version chosen when the dependency's requirement becomes `requirement`
    async fn latest_resolvable_version(
        &self,
        context: &ResolutionContext,
        requirement: &str,
    ) -> Result<Option<Version>, ResolverError> {
        simple::latest_resolvable_version(context, requirement).await
    }
}

#[async_trait]
impl VersionResolver for Box<dyn VersionResolver> {
    fn package_manager(&self) -> PackageManager {
        self.as_ref().package_manager()
    }

    async fn latest_version(
        &self,
        context: &ResolutionContext,
    ) -> Result<Option<LatestVersion>, ResolverError> {
        self.as_ref().latest_version(context).await
    }

    async fn lowest_security_fix_version(
        &self,
        context: &ResolutionContext,
    ) -> Result<Option<Version>, ResolverError> {
        self.as_ref().lowest_security_fix_version(context).await
    }

    async fn is_resolvable(
        &self,
        context: &ResolutionContext,
        candidate: &Version,
    ) -> Result<bool, ResolverError> {
        self.as_ref().is_resolvable(context, candidate).await
    }

    async fn latest_resolvable_version(
        &self,
        context: &ResolutionContext,
        requirement: &str,
    ) -> Result<Option<Version>, ResolverError> {
        self.as_ref()
            .latest_resolvable_version(context, requirement)
            .await
    }
}

/// Resolver for an ecosystem
pub fn resolver_for(package_manager: PackageManager) -> Box<dyn VersionResolver> {
    match package_manager {
        PackageManager::Bundler => Box::new(BundlerResolver::new()),
        PackageManager::Pip => Box::new(PipCompileResolver::new()),
        PackageManager::Cargo => Box::new(CargoResolver::new()),
    }
}

/// The I/O collaborators of an engine
#[derive(Clone)]
pub struct EngineComponents {
    pub http: HttpClient,
    pub git: Arc<dyn GitRemote>,
    pub runner: Arc<dyn HelperRunner>,
}

impl EngineComponents {
    /// Real HTTP client, git binary and helper subprocesses
    pub fn from_config(config: &ResolverConfig) -> Result<Self, ResolverError> {
        let http = HttpClient::with_config(config.http_timeout, &config.user_agent)?
            .with_max_retries(config.max_retries);
        Ok(Self {
            http,
            git: Arc::new(SystemGit::new(config.git_program.clone(), config.git_timeout)),
            runner: Arc::new(SystemHelperRunner::new()),
        })
    }

    /// Replaces the git remote (builder pattern)
    pub fn with_git(mut self, git: Arc<dyn GitRemote>) -> Self {
        self.git = git;
        self
    }

    /// Replaces the helper runner (builder pattern)
    pub fn with_runner(mut self, runner: Arc<dyn HelperRunner>) -> Self {
        self.runner = runner;
        self
    }
}

/// Everything a resolver needs for one request
pub struct ResolutionContext {
    request: ResolutionRequest,
    registry: RegistryClient,
    bridge: Arc<NativeResolverBridge>,
    scheme: VersionScheme,
    runtime: Option<Version>,
    policy: Option<Eligibility>,
}

impl ResolutionContext {
    pub fn request(&self) -> &ResolutionRequest {
        &self.request
    }

    pub fn dependency(&self) -> &Dependency {
        &self.request.dependency
    }

    pub fn credentials(&self) -> &Credentials {
        &self.request.credentials
    }

    pub fn registry(&self) -> &RegistryClient {
        &self.registry
    }

    pub fn bridge(&self) -> &NativeResolverBridge {
        &self.bridge
    }

    pub fn scheme(&self) -> VersionScheme {
        self.scheme
    }

    /// Runtime version pinned by the project, if any
    pub fn runtime(&self) -> Option<&Version> {
        self.runtime.as_ref()
    }

    /// The dependency's own source among the supplied files
    pub fn source(&self) -> VersionSource {
        self.dependency().source(self.request.file_names())
    }

    /// Current version, when it parses as a version (not a commit)
    pub fn current_version(&self) -> Option<Version> {
        self.dependency()
            .version()
            .and_then(|v| Version::parse(self.scheme, v))
    }

    /// Pre-releases are wanted when the dependency already uses one
    pub fn allow_prerelease(&self) -> bool {
        if self.current_version().is_some_and(|v| v.is_prerelease()) {
            return true;
        }
        self.dependency()
            .requirement_strings()
            .filter_map(|r| Constraint::parse_requirement(self.scheme, r).ok())
            .any(|c| c.has_prerelease())
    }

    /// Ranges covered by advisories about this dependency
    pub fn vulnerable_ranges(&self) -> Result<Vec<Constraint>, ResolverError> {
        let mut ranges = Vec::new();
        for advisory in self.request.relevant_advisories() {
            ranges.extend(advisory.constraints(self.scheme)?);
        }
        Ok(ranges)
    }

    /// Fetches the listing for `source` and builds the matching filter
    pub async fn candidates(
        &self,
        source: &VersionSource,
    ) -> Result<(Vec<Version>, CandidateFilter), ResolverError> {
        let infos = self
            .registry
            .fetch_versions(&self.dependency().name, source, self.credentials())
            .await?;
        let versions =
            CandidateFilter::parse_versions(self.scheme, infos.iter().map(|i| i.version.as_str()));

        let mut filter = CandidateFilter::new()
            .with_ignored(self.request.ignored_versions.constraints(self.scheme)?)
            .with_raise_on_ignored(self.request.raise_on_ignored)
            .with_prerelease(self.allow_prerelease());

        let runtime = self.runtime.as_ref().map(|r| runtime_eligibility(&infos, r));
        let eligibility: Option<Eligibility> = match (runtime, self.policy.clone()) {
            (Some(a), Some(b)) => Some(Arc::new(move |v: &Version| a(v) && b(v))),
            (a, b) => a.or(b),
        };
        if let Some(eligibility) = eligibility {
            filter = filter.with_eligibility(eligibility);
        }
        Ok((versions, filter))
    }
}

/// Façade answering resolution questions for one dependency.
///
/// Caches live exactly as long as the engine; use one engine per
/// dependency.
pub struct VersionResolutionEngine<R: VersionResolver = Box<dyn VersionResolver>> {
    resolver: R,
    context: ResolutionContext,
}

impl VersionResolutionEngine {
    /// Engine for the request's ecosystem with real collaborators
    pub fn for_request(
        request: ResolutionRequest,
        config: &ResolverConfig,
    ) -> Result<Self, ResolverError> {
        let components = EngineComponents::from_config(config)?;
        Self::with_components(request, config, components)
    }

    /// Engine for the request's ecosystem with the given collaborators
    pub fn with_components(
        request: ResolutionRequest,
        config: &ResolverConfig,
        components: EngineComponents,
    ) -> Result<Self, ResolverError> {
        let resolver = resolver_for(request.dependency.package_manager);
        VersionResolutionEngine::new(resolver, request, config, components)
    }
}

impl<R: VersionResolver> VersionResolutionEngine<R> {
    pub fn new(
        resolver: R,
        request: ResolutionRequest,
        config: &ResolverConfig,
        components: EngineComponents,
    ) -> Result<Self, ResolverError> {
        request.validate()?;
        let package_manager = resolver.package_manager();
        if request.dependency.package_manager != package_manager {
            return Err(ResolverError::invalid_request(format!(
                "{} cannot resolve a {} dependency",
                package_manager, request.dependency.package_manager
            )));
        }

        let bridge = Arc::new(NativeResolverBridge::new(
            components.runner,
            config.helper(package_manager),
            config.helper_timeout,
        ));

        let mut entry_points: Vec<&str> = request
            .dependency
            .requirements
            .iter()
            .map(|r| r.file.as_str())
            .collect();
        if entry_points.is_empty() {
            entry_points = request.file_names().collect();
        }
        let helper_files =
            minimal_file_set(package_manager, &request.dependency_files, &entry_points);

        let registry = RegistryClient::new(
            create_adapter(package_manager, components.http, config),
            bridge.clone(),
            components.git,
            helper_files,
        );

        let runtime = package_manager
            .runtime_version_file()
            .and_then(|name| request.file(name))
            .and_then(runtime_version);

        debug!(target: "engine", dependency = %request.dependency, "engine created");
        Ok(Self {
            resolver,
            context: ResolutionContext {
                scheme: package_manager.version_scheme(),
                request,
                registry,
                bridge,
                runtime,
                policy: None,
            },
        })
    }

    /// Adds a caller policy deciding which versions may be chosen
    pub fn with_eligibility(mut self, eligibility: Eligibility) -> Self {
        self.context.policy = Some(eligibility);
        self
    }

    pub fn context(&self) -> &ResolutionContext {
        &self.context
    }

    pub async fn latest_version(&self) -> Result<Option<LatestVersion>, ResolverError> {
        let result = self.resolver.latest_version(&self.context).await;
        debug!(target: "engine", dependency = %self.context.dependency().name, ?result, "latest version");
        result
    }

    pub async fn lowest_security_fix_version(&self) -> Result<Option<Version>, ResolverError> {
        let result = self.resolver.lowest_security_fix_version(&self.context).await;
        debug!(target: "engine", dependency = %self.context.dependency().name, ?result, "lowest security fix");
        result
    }

    pub async fn is_resolvable(&self, candidate: &Version) -> Result<bool, ResolverError> {
        let result = self.resolver.is_resolvable(&self.context, candidate).await;
        debug!(target: "engine", dependency = %self.context.dependency().name, %candidate, ?result, "resolvability");
        result
    }

    /// Parses `candidate` in the ecosystem's grammar, then checks it
    pub async fn is_resolvable_str(&self, candidate: &str) -> Result<bool, ResolverError> {
        let version = Version::parse(self.context.scheme, candidate).ok_or_else(|| {
            ResolverError::invalid_request(format!("'{}' is not a valid version", candidate))
        })?;
        self.is_resolvable(&version).await
    }

    pub async fn latest_resolvable_version(
        &self,
        requirement: &str,
    ) -> Result<Option<Version>, ResolverError> {
        let result = self
            .resolver
            .latest_resolvable_version(&self.context, requirement)
            .await;
        debug!(target: "engine", dependency = %self.context.dependency().name, requirement, ?result, "latest resolvable version");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DependencyFile, Requirement};

    fn engine(request: ResolutionRequest) -> VersionResolutionEngine {
        VersionResolutionEngine::for_request(request, &ResolverConfig::new()).unwrap()
    }

    #[test]
    fn test_rejects_requirement_for_missing_file() {
        let dep = Dependency::new("business", PackageManager::Bundler)
            .with_requirement(Requirement::new("Gemfile"));
        let request = ResolutionRequest::new(dep, vec![]);
        let err = VersionResolutionEngine::for_request(request, &ResolverConfig::new())
            .err()
            .unwrap();
        assert!(matches!(err, ResolverError::InvalidRequest { .. }));
    }

    #[test]
    fn test_rejects_mismatched_resolver() {
        let dep = Dependency::new("boto3", PackageManager::Pip);
        let request = ResolutionRequest::new(dep, vec![]);
        let config = ResolverConfig::new();
        let components = EngineComponents::from_config(&config).unwrap();
        let err = VersionResolutionEngine::new(BundlerResolver::new(), request, &config, components)
            .err()
            .unwrap();
        assert!(matches!(err, ResolverError::InvalidRequest { .. }));
    }

    #[test]
    fn test_prerelease_allowed_by_current_version() {
        let dep = Dependency::new("business", PackageManager::Bundler).with_version("1.4.0.beta");
        let engine = engine(ResolutionRequest::new(dep, vec![]));
        assert!(engine.context().allow_prerelease());
    }

    #[test]
    fn test_prerelease_allowed_by_requirement() {
        let dep = Dependency::new("business", PackageManager::Bundler)
            .with_version("1.3.0")
            .with_requirement(Requirement::new("Gemfile").with_requirement("~> 1.4.0.rc1"));
        let engine = engine(ResolutionRequest::new(
            dep,
            vec![DependencyFile::new("Gemfile", "gem 'business', '~> 1.4.0.rc1'")],
        ));
        assert!(engine.context().allow_prerelease());
    }

    #[test]
    fn test_stable_dependency_excludes_prereleases() {
        let dep = Dependency::new("business", PackageManager::Bundler)
            .with_version("1.3.0")
            .with_requirement(Requirement::new("Gemfile").with_requirement("~> 1.3"));
        let engine = engine(ResolutionRequest::new(
            dep,
            vec![DependencyFile::new("Gemfile", "gem 'business', '~> 1.3'")],
        ));
        assert!(!engine.context().allow_prerelease());
    }

    #[test]
    fn test_commit_sha_is_not_a_current_version() {
        let dep = Dependency::new("business", PackageManager::Bundler)
            .with_version("37f41032a0f191507903ebbae8a5c0cb945d7585");
        let engine = engine(ResolutionRequest::new(dep, vec![]));
        assert!(engine.context().current_version().is_none());
    }

    #[test]
    fn test_runtime_version_is_read() {
        let dep = Dependency::new("business", PackageManager::Bundler);
        let engine = engine(ResolutionRequest::new(
            dep,
            vec![DependencyFile::new(".ruby-version", "ruby-2.7.1\n")],
        ));
        assert_eq!(engine.context().runtime().unwrap().as_str(), "2.7.1");
    }

    #[tokio::test]
    async fn test_is_resolvable_str_rejects_garbage() {
        let dep = Dependency::new("business", PackageManager::Bundler);
        let engine = engine(ResolutionRequest::new(dep, vec![]));
        let err = engine.is_resolvable_str("not a version").await.unwrap_err();
        assert!(matches!(err, ResolverError::InvalidRequest { .. }));
    }
}
