use {
    super::{BlobStore, Download, MAX_ID_ATTEMPTS, Upload},
    crate::util::create_private_dir_all,
    anyhow::{Context as _, Result, bail, ensure},
    fs_err::File,
    stash_protocol::StashId,
    std::{
        io::{self, Read, Write},
        path::PathBuf,
    },
    tempfile::{NamedTempFile, PersistError},
    tracing::debug,
};

/// Stores every blob as a file named by its id in a single directory.
///
/// Uploads are written to `<root>/tmp/` and moved into place on commit, so a blob is either
/// complete or absent.
#[derive(Debug)]
pub struct FilesystemStore {
    root: PathBuf,
    tmp: PathBuf,
}

impl FilesystemStore {
    #[inline]
    pub fn new(root: PathBuf) -> Result<Self> {
        if root
            .try_exists()
            .with_context(|| format!("failed to access {}", root.display()))?
        {
            ensure!(root.is_dir(), "store path {} is not a directory", root.display());
        } else {
            debug!("creating store directory {}", root.display());
        }
        let tmp = root.join("tmp");
        create_private_dir_all(&tmp)
            .with_context(|| format!("failed to create {}", tmp.display()))?;
        Ok(Self { root, tmp })
    }

    /// Writes a whole blob at once.
    #[inline]
    pub fn store(&self, data: &[u8]) -> Result<StashId> {
        let mut file = self.create_file()?;
        file.write_all(data)?;
        self.commit_file(file)
    }

    /// Reads a whole blob at once.
    #[inline]
    pub fn load(&self, id: &StashId) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        self.open_file(id)?.read_to_end(&mut data)?;
        Ok(data)
    }

    fn create_file(&self) -> Result<NamedTempFile> {
        NamedTempFile::new_in(&self.tmp)
            .with_context(|| format!("failed to create file in {}", self.tmp.display()))
    }

    fn commit_file(&self, mut file: NamedTempFile) -> Result<StashId> {
        file.flush()?;
        for _ in 0..MAX_ID_ATTEMPTS {
            let id = StashId::generate()?;
            match file.persist_noclobber(self.root.join(id.as_str())) {
                Ok(_) => {
                    debug!("stored blob {id}");
                    return Ok(id);
                }
                Err(PersistError { error, file: returned })
                    if error.kind() == io::ErrorKind::AlreadyExists =>
                {
                    file = returned;
                }
                Err(err) => return Err(err.error).context("failed to commit blob"),
            }
        }
        bail!("failed to find an unused stash id");
    }

    fn open_file(&self, id: &StashId) -> Result<File> {
        let path = self.root.join(id.as_str());
        if !path.is_file() {
            bail!("stash not found: {id}");
        }
        Ok(File::open(path)?)
    }
}

impl BlobStore for FilesystemStore {
    fn upload(&self) -> Result<Box<dyn Upload + '_>> {
        Ok(Box::new(FilesystemUpload {
            store: self,
            file: self.create_file()?,
        }))
    }

    fn download(&self, id: &StashId) -> Result<Box<dyn Download + '_>> {
        Ok(Box::new(self.open_file(id)?))
    }
}

/// Dropping an unfinished upload deletes its temporary file.
struct FilesystemUpload<'a> {
    store: &'a FilesystemStore,
    file: NamedTempFile,
}

impl Write for FilesystemUpload<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Upload for FilesystemUpload<'_> {
    fn finish(self: Box<Self>) -> Result<StashId> {
        self.store.commit_file(self.file)
    }
}

impl Download for File {
    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
