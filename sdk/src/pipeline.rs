//! Copy and paste: the chains that connect the archive, compression, encryption and a blob
//! store.
//!
//! A stored blob is `salt ‖ iv ‖ AES-128-OFB(gzip(tar))`.

use {
    crate::{
        archive::{self, StdinSource},
        crypto::{DecryptingReader, EncryptingWriter, Password},
        storage::BlobStore,
    },
    anyhow::{Context as _, Result},
    flate2::{Compression, read::GzDecoder, write::GzEncoder},
    stash_protocol::StashId,
    std::{
        io::{self, Write},
        path::{Path, PathBuf},
    },
    tracing::{debug, instrument},
};

/// Archives `paths` (or stdin), compresses, encrypts and uploads them to `store`.
#[instrument(skip_all)]
#[inline]
pub fn copy(
    store: &dyn BlobStore,
    password: Password,
    paths: &[PathBuf],
    stdin: &mut StdinSource<'_>,
) -> Result<StashId> {
    let upload = store.upload().context("failed to start upload")?;
    let encryptor = EncryptingWriter::new(upload, password);
    let compressor = GzEncoder::new(encryptor, Compression::best());
    let compressor = archive::pack(paths, stdin, compressor)?;
    debug!("archive complete");

    // Inside out: each layer flushes its tail into the next one.
    let encryptor = compressor
        .finish()
        .context("failed to finish compression")?;
    let upload = encryptor.finish().context("failed to finish encryption")?;
    let id = upload.finish().context("failed to finish upload")?;
    debug!("uploaded stash {id}");
    Ok(id)
}

/// Downloads the stash `id` from `store` and unpacks it into `destination`, sending stdin
/// entries to `stdout`.
#[instrument(skip_all, fields(%id))]
#[inline]
pub fn paste(
    store: &dyn BlobStore,
    password: Password,
    id: &StashId,
    destination: &Path,
    stdout: &mut dyn Write,
) -> Result<()> {
    let download = store
        .download(id)
        .with_context(|| format!("failed to download stash {id}"))?;
    let decryptor = DecryptingReader::new(download, password);
    let mut decompressor = GzDecoder::new(decryptor);
    archive::unpack(&mut decompressor, destination, stdout)
        .context("failed to unpack stash (is the password correct?)")?;
    // The archive ends before the gzip trailer; reading it verifies the checksum.
    io::copy(&mut decompressor, &mut io::sink()).context("stash is corrupted")?;
    debug!("archive complete");

    let download = decompressor
        .into_inner()
        .finish()
        .context("failed to finish decryption")?;
    download.close().context("failed to finish download")?;
    Ok(())
}
