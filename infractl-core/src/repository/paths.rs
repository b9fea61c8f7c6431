use std::path::{Path, PathBuf};

use log::debug;

pub const REPOSITORY_CONFIG_ENV_VAR: &str = "HELM_REPOSITORY_CONFIG";
pub const REPOSITORY_CACHE_ENV_VAR: &str = "HELM_REPOSITORY_CACHE";
pub const XDG_CONFIG_HOME_ENV_VAR: &str = "XDG_CONFIG_HOME";
pub const XDG_CACHE_HOME_ENV_VAR: &str = "XDG_CACHE_HOME";

const REPOSITORY_CONFIG_FILENAME: &str = "repositories.yaml";

/// Locations of the package manager's repository registration file and index cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelmPaths {
    pub repository_config: PathBuf,
    pub repository_cache: PathBuf,
}

impl HelmPaths {
    pub fn new(repository_config: PathBuf, repository_cache: PathBuf) -> Self {
        Self {
            repository_config,
            repository_cache,
        }
    }

    /// Resolves the paths from the process environment, explicit overrides win.
    pub fn resolve(config_override: Option<&Path>, cache_override: Option<&Path>) -> Self {
        Self::resolve_with(config_override, cache_override, |key| {
            std::env::var(key).ok()
        })
    }

    pub fn resolve_with(
        config_override: Option<&Path>,
        cache_override: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let env = |key: &str| env(key).filter(|value| !value.trim().is_empty());
        let home = || home::home_dir().unwrap_or_default();

        let repository_config = config_override
            .map(Path::to_path_buf)
            .or_else(|| env(REPOSITORY_CONFIG_ENV_VAR).map(PathBuf::from))
            .or_else(|| {
                env(XDG_CONFIG_HOME_ENV_VAR)
                    .map(|dir| PathBuf::from(dir).join("helm").join(REPOSITORY_CONFIG_FILENAME))
            })
            .unwrap_or_else(|| {
                home()
                    .join(".config")
                    .join("helm")
                    .join(REPOSITORY_CONFIG_FILENAME)
            });

        let repository_cache = cache_override
            .map(Path::to_path_buf)
            .or_else(|| env(REPOSITORY_CACHE_ENV_VAR).map(PathBuf::from))
            .or_else(|| {
                env(XDG_CACHE_HOME_ENV_VAR)
                    .map(|dir| PathBuf::from(dir).join("helm").join("repository"))
            })
            .unwrap_or_else(|| home().join(".cache").join("helm").join("repository"));

        debug!("Repository config: {repository_config:?}, cache: {repository_cache:?}");

        Self::new(repository_config, repository_cache)
    }

    /// `<cache>/<name>-index.yaml`
    pub fn index_file(&self, repository_name: &str) -> PathBuf {
        self.repository_cache
            .join(format!("{repository_name}-index.yaml"))
    }

    /// `<cache>/<chart>-<version>.tgz`
    pub fn archive_file(&self, chart_name: &str, version: &str) -> PathBuf {
        self.repository_cache
            .join(format!("{chart_name}-{version}.tgz"))
    }

    /// Environment handed to package manager child processes.
    pub fn env_vars(&self) -> [(&'static str, &Path); 2] {
        [
            (REPOSITORY_CONFIG_ENV_VAR, self.repository_config.as_path()),
            (REPOSITORY_CACHE_ENV_VAR, self.repository_cache.as_path()),
        ]
    }
}
