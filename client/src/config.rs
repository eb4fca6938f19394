use {
    anyhow::{Context as _, Result},
    derivative::Derivative,
    serde::{Deserialize, Serialize},
    stash_sdk::storage::Backend,
    std::path::{Path, PathBuf},
    tracing::debug,
};

#[derive(Derivative, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[derivative(Debug)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    #[derivative(Debug = "ignore")]
    pub password: Option<String>,
    /// Filesystem store in the user's data directory if unset.
    #[serde(default)]
    pub backend: Option<Backend>,
    /// `EnvFilter` directives, e.g. `info,stash_sdk=debug`.
    #[serde(default)]
    pub log_filter: Option<String>,
}

#[inline]
pub fn default_config_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("failed to get home directory")?;
    Ok(home.join(".stash"))
}

impl Config {
    /// Loads `path`, or the default config file if it exists.
    #[inline]
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::parse_file(path);
        }
        let path = default_config_path()?;
        if !path.try_exists()? {
            return Ok(Self::default());
        }
        Self::parse_file(&path)
    }

    fn parse_file(path: &Path) -> Result<Self> {
        let text = fs_err::read_to_string(path)?;
        json5::from_str(&text).with_context(|| format!("invalid config file {}", path.display()))
    }

    #[inline]
    pub fn backend(&self) -> Result<Backend> {
        if let Some(backend) = &self.backend {
            return Ok(backend.clone());
        }
        let backend = Backend::default_filesystem()?;
        debug!("using default backend {backend:?}");
        Ok(backend)
    }
}
