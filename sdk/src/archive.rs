//! Packs files, directory trees and standard input into a tar stream and unpacks it back.

use {
    crate::util::create_private_dir_all,
    anyhow::{Context as _, Result},
    std::{
        ffi::OsString,
        fs,
        io::{self, IsTerminal, Read, Write},
        path::{self, Component, Path, PathBuf},
    },
    tar::{Archive, Builder, EntryType, Header},
    tracing::{debug, info, warn},
    walkdir::WalkDir,
};

/// Entry name reserved for standard input on copy and standard output on paste.
pub const STDIN_ENTRY: &str = "$stdin";

/// Path argument that captures standard input at its position.
pub const STDIN_ARG: &str = "-";

const STDIN_MODE: u32 = 0o600;

/// Where `$stdin` entries are read from.
pub struct StdinSource<'a> {
    reader: Box<dyn Read + 'a>,
    is_terminal: bool,
}

impl StdinSource<'static> {
    #[must_use]
    #[inline]
    pub fn from_process() -> Self {
        let stdin = io::stdin();
        Self {
            is_terminal: stdin.is_terminal(),
            reader: Box::new(stdin),
        }
    }
}

impl<'a> StdinSource<'a> {
    #[must_use]
    #[inline]
    pub fn new(reader: impl Read + 'a, is_terminal: bool) -> Self {
        Self {
            reader: Box::new(reader),
            is_terminal,
        }
    }

    #[must_use]
    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.is_terminal
    }
}

/// Writes an archive of `paths` (or of stdin) to `output` and returns `output`.
///
/// If stdin is not a terminal, its content becomes the only entry. Otherwise each path is
/// walked recursively and its regular files are added; `-` adds stdin at that position,
/// and an empty `paths` prompts for stdin.
///
/// The end-of-archive marker is written even if adding an entry fails. If writing the marker
/// fails too, that error is returned and the entry error is only logged.
#[inline]
pub fn pack<W: Write>(paths: &[PathBuf], stdin: &mut StdinSource<'_>, output: W) -> Result<W> {
    let mut builder = Builder::new(output);
    let appended = append_entries(&mut builder, paths, stdin);
    let finished = builder.into_inner().context("failed to finalize archive");
    match (appended, finished) {
        (Ok(()), finished) => finished,
        (Err(err), Ok(_)) => Err(err),
        (Err(err), Err(finish_err)) => {
            warn!("failed to archive entries: {err:#}");
            Err(finish_err)
        }
    }
}

fn append_entries<W: Write>(
    builder: &mut Builder<W>,
    paths: &[PathBuf],
    stdin: &mut StdinSource<'_>,
) -> Result<()> {
    if !stdin.is_terminal {
        if !paths.is_empty() {
            warn!("stdin is not a terminal, ignoring {} path(s)", paths.len());
        }
        debug!("copy from stdin");
        return append_stdin(builder, stdin);
    }
    if paths.is_empty() {
        info!("Copy from stdin (^D when done).");
        return append_stdin(builder, stdin);
    }
    for path in paths {
        if path.as_os_str() == STDIN_ARG {
            info!("Copy from stdin (^D when done).");
            append_stdin(builder, stdin)?;
        } else {
            append_tree(builder, path)?;
        }
    }
    Ok(())
}

fn append_stdin<W: Write>(builder: &mut Builder<W>, stdin: &mut StdinSource<'_>) -> Result<()> {
    let mut content = Vec::new();
    stdin
        .reader
        .read_to_end(&mut content)
        .context("failed to read stdin")?;
    let mut header = Header::new_gnu();
    header.set_entry_type(EntryType::Regular);
    header.set_size(content.len().try_into()?);
    header.set_mode(STDIN_MODE);
    builder
        .append_data(&mut header, STDIN_ENTRY, content.as_slice())
        .context("failed to archive stdin")
}

fn append_tree<W: Write>(builder: &mut Builder<W>, root: &Path) -> Result<()> {
    let base_name = base_name(root)?;
    for file in regular_files(root) {
        let (path, metadata) = file.with_context(|| format!("failed to walk {}", root.display()))?;
        let relative = path.strip_prefix(root)?;
        let name = if relative.as_os_str().is_empty() {
            PathBuf::from(&base_name)
        } else {
            Path::new(&base_name).join(relative)
        };
        debug!("copy {}", name.display());
        append_file(builder, &path, &name, &metadata)
            .with_context(|| format!("failed to archive {}", path.display()))?;
    }
    Ok(())
}

fn append_file<W: Write>(
    builder: &mut Builder<W>,
    path: &Path,
    name: &Path,
    metadata: &fs::Metadata,
) -> Result<()> {
    let file = fs_err::File::open(path)?;
    let mut header = Header::new_gnu();
    header.set_metadata(metadata);
    // The header declares the size from `metadata`; the content must match it exactly.
    builder.append_data(&mut header, name, SizedReader::new(file, metadata.len()))?;
    Ok(())
}

/// Yields exactly `remaining` bytes of `inner`: extra bytes are cut off and an early end is
/// an error.
struct SizedReader<R> {
    inner: R,
    remaining: u64,
}

impl<R: Read> SizedReader<R> {
    fn new(inner: R, len: u64) -> Self {
        Self {
            inner,
            remaining: len,
        }
    }
}

impl<R: Read> Read for SizedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 {
            return Ok(0);
        }
        let max = usize::try_from(self.remaining).unwrap_or(usize::MAX).min(buf.len());
        let Some(buf) = buf.get_mut(..max) else {
            return Ok(0);
        };
        let len = self.inner.read(buf)?;
        if len == 0 && !buf.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("file shrank while archiving, {} bytes missing", self.remaining),
            ));
        }
        self.remaining = self.remaining.saturating_sub(u64::try_from(len).unwrap_or(u64::MAX));
        Ok(len)
    }
}

/// Last component of the absolute, lexically normalized form of `path`.
fn base_name(path: &Path) -> Result<OsString> {
    let absolute = path::absolute(path)
        .with_context(|| format!("failed to resolve {}", path.display()))?;
    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::ParentDir => {
                normalized.pop();
            }
            Component::CurDir => {}
            Component::Prefix(_) | Component::RootDir | Component::Normal(_) => {
                normalized.push(component);
            }
        }
    }
    normalized
        .file_name()
        .map(ToOwned::to_owned)
        .with_context(|| format!("cannot archive {}: path has no file name", path.display()))
}

/// Regular files under `root` in lexical order. Symlinks are not followed.
#[expect(clippy::filetype_is_file, reason = "symlinks and special files are skipped")]
fn regular_files(root: &Path) -> impl Iterator<Item = Result<(PathBuf, fs::Metadata)>> + use<> {
    WalkDir::new(root)
        .follow_links(false)
        .follow_root_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => return Some(Err(err.into())),
            };
            if !entry.file_type().is_file() {
                return None;
            }
            Some(
                entry
                    .metadata()
                    .map(|metadata| (entry.into_path(), metadata))
                    .map_err(Into::into),
            )
        })
}

/// Replays the archive read from `input`: `$stdin` entries go to `stdout`, everything else
/// becomes a new file under `destination`.
///
/// Existing files are never overwritten. Entry names are not sanitized, so the archive must
/// come from a trusted source.
#[inline]
pub fn unpack(input: impl Read, destination: &Path, stdout: &mut dyn Write) -> Result<()> {
    let mut archive = Archive::new(input);
    for entry in archive.entries().context("failed to read archive")? {
        let mut entry = entry.context("failed to read archive entry")?;
        let name = entry
            .path()
            .context("invalid archive entry name")?
            .into_owned();
        if name.as_os_str() == STDIN_ENTRY {
            io::copy(&mut entry, stdout).context("failed to write stdin entry to stdout")?;
            continue;
        }
        let entry_type = entry.header().entry_type();
        if !entry_type.is_file() {
            warn!("skipping unsupported entry {} ({entry_type:?})", name.display());
            continue;
        }
        let mode = entry
            .header()
            .mode()
            .with_context(|| format!("invalid mode of {}", name.display()))?;
        debug!("unpack {}", name.display());
        unpack_file(&mut entry, &destination.join(&name), mode)
            .with_context(|| format!("failed to unpack {}", name.display()))?;
    }
    Ok(())
}

fn unpack_file(content: &mut impl Read, path: &Path, mode: u32) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_private_dir_all(parent)?;
    }
    let mut file = create_new_file(path, mode)?;
    io::copy(content, &mut file)?;
    Ok(())
}

#[cfg(target_family = "unix")]
fn create_new_file(path: &Path, mode: u32) -> io::Result<fs_err::File> {
    use fs_err::os::unix::fs::OpenOptionsExt;

    fs_err::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(mode & 0o7777)
        .open(path)
}

#[cfg(not(target_family = "unix"))]
fn create_new_file(path: &Path, _mode: u32) -> io::Result<fs_err::File> {
    fs_err::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
}

#[cfg(test)]
#[expect(clippy::indexing_slicing, reason = "test")]
mod tests {
    use {
        super::*,
        fs_err::{create_dir_all, read, read_to_string, write},
        tempfile::TempDir,
    };

    fn terminal() -> StdinSource<'static> {
        StdinSource::new(io::empty(), true)
    }

    fn entry_names(archive: &[u8]) -> Vec<String> {
        Archive::new(archive)
            .entries()
            .unwrap()
            .map(|entry| {
                let entry = entry.unwrap();
                entry.path().unwrap().to_string_lossy().into_owned()
            })
            .collect()
    }

    fn unpack_to(archive: &[u8], destination: &Path) -> Result<Vec<u8>> {
        let mut stdout = Vec::new();
        unpack(archive, destination, &mut stdout)?;
        Ok(stdout)
    }

    #[test]
    fn single_file() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let file = src.path().join("hello.txt");
        write(&file, "hello").unwrap();

        let archive = pack(&[file], &mut terminal(), Vec::new()).unwrap();
        assert_eq!(entry_names(&archive), ["hello.txt"]);

        let stdout = unpack_to(&archive, dst.path()).unwrap();
        assert!(stdout.is_empty());
        assert_eq!(read_to_string(dst.path().join("hello.txt")).unwrap(), "hello");
    }

    #[test]
    fn directory_tree() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let root = src.path().join("tree");
        create_dir_all(root.join("sub/deeper")).unwrap();
        create_dir_all(root.join("empty")).unwrap();
        write(root.join("a.txt"), "a").unwrap();
        write(root.join("sub/b.txt"), "b").unwrap();
        write(root.join("sub/deeper/c.txt"), "c").unwrap();

        let archive = pack(&[root], &mut terminal(), Vec::new()).unwrap();
        assert_eq!(
            entry_names(&archive),
            ["tree/a.txt", "tree/sub/b.txt", "tree/sub/deeper/c.txt"]
        );

        unpack_to(&archive, dst.path()).unwrap();
        let tree = dst.path().join("tree");
        assert_eq!(read_to_string(tree.join("a.txt")).unwrap(), "a");
        assert_eq!(read_to_string(tree.join("sub/b.txt")).unwrap(), "b");
        assert_eq!(read_to_string(tree.join("sub/deeper/c.txt")).unwrap(), "c");
        assert!(!tree.join("empty").exists());
    }

    #[test]
    fn relative_path_uses_absolute_base_name() {
        let src = TempDir::new().unwrap();
        let root = src.path().join("project");
        create_dir_all(root.join("src")).unwrap();
        write(root.join("src/main.rs"), "fn main() {}").unwrap();

        let archive = pack(&[root.join("src/..")], &mut terminal(), Vec::new()).unwrap();
        assert_eq!(entry_names(&archive), ["project/src/main.rs"]);
    }

    #[test]
    fn piped_stdin_is_the_only_entry() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let file = src.path().join("ignored.txt");
        write(&file, "ignored").unwrap();

        let mut stdin = StdinSource::new(&b"piped data"[..], false);
        let archive = pack(&[], &mut stdin, Vec::new()).unwrap();
        assert_eq!(entry_names(&archive), [STDIN_ENTRY]);

        let mut stdin = StdinSource::new(&b"piped data"[..], false);
        let archive = pack(&[file], &mut stdin, Vec::new()).unwrap();
        assert_eq!(entry_names(&archive), [STDIN_ENTRY]);

        let stdout = unpack_to(&archive, dst.path()).unwrap();
        assert_eq!(stdout, b"piped data");
        assert_eq!(fs_err::read_dir(dst.path()).unwrap().count(), 0);
    }

    #[test]
    fn interactive_stdin() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let file = src.path().join("x.txt");
        write(&file, "x").unwrap();

        let mut stdin = StdinSource::new(&b"typed"[..], true);
        let archive = pack(&[], &mut stdin, Vec::new()).unwrap();
        assert_eq!(entry_names(&archive), [STDIN_ENTRY]);

        let mut stdin = StdinSource::new(&b"abc"[..], true);
        let paths = [PathBuf::from(STDIN_ARG), file, PathBuf::from(STDIN_ARG)];
        let archive = pack(&paths, &mut stdin, Vec::new()).unwrap();
        assert_eq!(entry_names(&archive), [STDIN_ENTRY, "x.txt", STDIN_ENTRY]);

        let stdout = unpack_to(&archive, dst.path()).unwrap();
        assert_eq!(stdout, b"abc");
        assert_eq!(read_to_string(dst.path().join("x.txt")).unwrap(), "x");
    }

    #[test]
    fn unpack_does_not_overwrite() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        create_dir_all(src.path().join("a")).unwrap();
        write(src.path().join("a/b.txt"), "new").unwrap();
        create_dir_all(dst.path().join("a")).unwrap();
        write(dst.path().join("a/b.txt"), "old").unwrap();

        let archive = pack(&[src.path().join("a")], &mut terminal(), Vec::new()).unwrap();
        let err = unpack_to(&archive, dst.path()).unwrap_err();
        let conflict = err
            .chain()
            .filter_map(|cause| cause.downcast_ref::<io::Error>())
            .any(|err| err.kind() == io::ErrorKind::AlreadyExists);
        assert!(conflict, "unexpected error: {err:#}");
        assert_eq!(read(dst.path().join("a/b.txt")).unwrap(), b"old");
    }

    #[test]
    fn missing_path_fails_and_names_it() {
        let src = TempDir::new().unwrap();
        let missing = src.path().join("nope");
        let err = pack(&[missing], &mut terminal(), Vec::new()).unwrap_err();
        assert!(format!("{err:#}").contains("nope"), "unexpected error: {err:#}");
    }

    /// Fails every write.
    #[derive(Debug)]
    struct BrokenSink;

    impl Write for BrokenSink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("sink broken"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn failed_entry_still_ends_archive() {
        let src = TempDir::new().unwrap();
        let file = src.path().join("x.txt");
        write(&file, "x").unwrap();
        let paths = [file, src.path().join("missing")];

        let mut output = Vec::new();
        pack(&paths, &mut terminal(), &mut output).unwrap_err();
        assert_eq!(output.len() % 512, 0);
        let marker = output.len().checked_sub(1024).unwrap();
        assert!(output[marker..].iter().all(|&byte| byte == 0));
        assert_eq!(entry_names(&output), ["x.txt"]);
    }

    #[test]
    fn finalization_error_wins() {
        let mut stdin = StdinSource::new(&b"data"[..], false);
        let err = pack(&[], &mut stdin, BrokenSink).unwrap_err();
        assert_eq!(err.to_string(), "failed to finalize archive");
        assert_eq!(err.root_cause().to_string(), "sink broken");
    }

    #[test]
    fn file_size_must_match_metadata() {
        let src = TempDir::new().unwrap();
        let file = src.path().join("changing");

        write(&file, "0123456789").unwrap();
        let metadata = fs::metadata(&file).unwrap();
        write(&file, "0123").unwrap();
        let mut builder = Builder::new(Vec::new());
        let err = append_file(&mut builder, &file, Path::new("changing"), &metadata).unwrap_err();
        let shrank = err
            .chain()
            .filter_map(|cause| cause.downcast_ref::<io::Error>())
            .any(|err| err.kind() == io::ErrorKind::UnexpectedEof);
        assert!(shrank, "unexpected error: {err:#}");

        let metadata = fs::metadata(&file).unwrap();
        write(&file, "0123456789").unwrap();
        let mut builder = Builder::new(Vec::new());
        append_file(&mut builder, &file, Path::new("changing"), &metadata).unwrap();
        let archive = builder.into_inner().unwrap();
        let mut archive = Archive::new(archive.as_slice());
        let mut entry = archive.entries().unwrap().next().unwrap().unwrap();
        let mut content = String::new();
        entry.read_to_string(&mut content).unwrap();
        assert_eq!(content, "0123");
    }

    #[test]
    fn garbage_input_fails() {
        let dst = TempDir::new().unwrap();
        let garbage: Vec<u8> = (0..2048).map(|i| (i % 251) as u8).collect();
        unpack_to(&garbage, dst.path()).unwrap_err();
    }

    #[cfg(target_family = "unix")]
    #[test]
    fn unix_specifics() {
        use std::os::unix::fs::{PermissionsExt, symlink};

        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let root = src.path().join("dir");
        create_dir_all(&root).unwrap();
        write(root.join("script.sh"), "#!/bin/sh").unwrap();
        fs::set_permissions(root.join("script.sh"), fs::Permissions::from_mode(0o750)).unwrap();
        symlink(root.join("script.sh"), root.join("link")).unwrap();

        let archive = pack(&[root], &mut terminal(), Vec::new()).unwrap();
        assert_eq!(entry_names(&archive), ["dir/script.sh"]);

        unpack_to(&archive, dst.path()).unwrap();
        let mode = fs::metadata(dst.path().join("dir/script.sh"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o750);
        let dir_mode = fs::metadata(dst.path().join("dir")).unwrap().permissions().mode();
        assert_eq!(dir_mode & 0o777, 0o700);
    }
}
