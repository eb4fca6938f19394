use {
    super::{BlobStore, Download, MAX_ID_ATTEMPTS, Upload},
    anyhow::{Result, bail, format_err},
    parking_lot::Mutex,
    stash_protocol::StashId,
    std::{
        collections::{HashMap, hash_map::Entry},
        io::{self, Cursor, Read, Write},
        sync::Arc,
    },
};

/// Keeps blobs in process memory. Clones share the same blobs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    blobs: Arc<Mutex<HashMap<StashId, Arc<[u8]>>>>,
}

impl InMemoryStore {
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.blobs.lock().len()
    }

    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.blobs.lock().is_empty()
    }

    fn insert(&self, data: Vec<u8>) -> Result<StashId> {
        let mut blobs = self.blobs.lock();
        let data = Arc::<[u8]>::from(data);
        for _ in 0..MAX_ID_ATTEMPTS {
            if let Entry::Vacant(entry) = blobs.entry(StashId::generate()?) {
                let id = entry.key().clone();
                entry.insert(data);
                return Ok(id);
            }
        }
        bail!("failed to find an unused stash id");
    }
}

impl BlobStore for InMemoryStore {
    fn upload(&self) -> Result<Box<dyn Upload + '_>> {
        Ok(Box::new(MemoryUpload {
            store: self,
            data: Vec::new(),
        }))
    }

    fn download(&self, id: &StashId) -> Result<Box<dyn Download + '_>> {
        let data = self
            .blobs
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| format_err!("stash not found: {id}"))?;
        Ok(Box::new(MemoryDownload(Cursor::new(data))))
    }
}

struct MemoryUpload<'a> {
    store: &'a InMemoryStore,
    data: Vec<u8>,
}

impl Write for MemoryUpload<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.data.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Upload for MemoryUpload<'_> {
    fn finish(self: Box<Self>) -> Result<StashId> {
        self.store.insert(self.data)
    }
}

struct MemoryDownload(Cursor<Arc<[u8]>>);

impl Read for MemoryDownload {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl Download for MemoryDownload {
    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
