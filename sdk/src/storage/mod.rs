//! Blob stores that keep encrypted stashes between a copy and a paste.

mod filesystem;
mod memory;
mod relay;

pub use {filesystem::FilesystemStore, memory::InMemoryStore, relay::HttpRelayStore};

use {
    anyhow::{Context as _, Result},
    serde::{Deserialize, Serialize},
    stash_protocol::StashId,
    std::{
        io::{Read, Write},
        path::PathBuf,
    },
    url::Url,
};

/// Fresh ids to try before giving up on a collision.
const MAX_ID_ATTEMPTS: usize = 8;

/// Opaque key/value store addressed by ids it assigns itself.
pub trait BlobStore {
    /// Starts a new blob. The id is only known after [`Upload::finish`].
    fn upload(&self) -> Result<Box<dyn Upload + '_>>;
    fn download(&self, id: &StashId) -> Result<Box<dyn Download + '_>>;
}

pub trait Upload: Write {
    /// Commits the written bytes and returns the id assigned to them.
    fn finish(self: Box<Self>) -> Result<StashId>;
}

pub trait Download: Read {
    fn close(self: Box<Self>) -> Result<()>;
}

/// Blob store selected in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Backend {
    Filesystem { path: PathBuf },
    HttpRelay { endpoint: Url },
    /// Lives only as long as the process. Useful for testing.
    InMemory,
}

impl Backend {
    /// Filesystem store in the user's data directory.
    #[inline]
    pub fn default_filesystem() -> Result<Self> {
        let data_dir = dirs::data_dir().context("failed to get user data directory")?;
        Ok(Self::Filesystem {
            path: data_dir.join("stash"),
        })
    }

    #[inline]
    pub fn open(&self) -> Result<Box<dyn BlobStore>> {
        Ok(match self {
            Self::Filesystem { path } => Box::new(FilesystemStore::new(path.clone())?),
            Self::HttpRelay { endpoint } => Box::new(HttpRelayStore::new(endpoint.clone())?),
            Self::InMemory => Box::new(InMemoryStore::default()),
        })
    }
}
