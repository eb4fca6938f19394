use std::{io, path::Path};

#[cfg(target_family = "unix")]
const PRIVATE_DIR_MODE: u32 = 0o700;

/// Creates `path` and all missing parents, readable only by the owner.
#[cfg(target_family = "unix")]
pub fn create_private_dir_all(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;

    // fs_err has no blocking `DirBuilder`.
    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(PRIVATE_DIR_MODE)
        .create(path)
        .map_err(|err| {
            io::Error::new(
                err.kind(),
                format!("{err} when creating directory `{}`", path.display()),
            )
        })
}

#[cfg(not(target_family = "unix"))]
pub fn create_private_dir_all(path: &Path) -> io::Result<()> {
    fs_err::create_dir_all(path)
}

#[cfg(test)]
mod tests {
    use {super::*, tempfile::TempDir};

    #[test]
    fn error_names_path() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("file");
        fs_err::write(&file, "").unwrap();
        let target = file.join("sub");
        let err = create_private_dir_all(&target).unwrap_err();
        assert!(
            err.to_string().contains(&target.display().to_string()),
            "{err}"
        );
    }

    #[cfg(target_family = "unix")]
    #[test]
    fn nested_dirs_are_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let target = dir.path().join("a/b");
        create_private_dir_all(&target).unwrap();
        create_private_dir_all(&target).unwrap();
        for path in [dir.path().join("a"), target] {
            let mode = fs_err::metadata(path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o700);
        }
    }
}
