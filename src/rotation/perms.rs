//! Permission-aware file and directory creation
//!
//! Modes are honored on Unix and ignored elsewhere.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;

use tracing::warn;

pub(crate) fn open_options(mode: u32) -> OpenOptions {
    #[allow(unused_mut)]
    let mut options = OpenOptions::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;
    options
}

/// Open (or create) for appending
pub(crate) fn open_append(path: &Path, mode: u32) -> io::Result<File> {
    open_options(mode).read(true).append(true).create(true).open(path)
}

/// Create or truncate for writing
pub(crate) fn create_truncate(path: &Path, mode: u32) -> io::Result<File> {
    open_options(mode)
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}

/// Create `dir` and missing parents with `mode`
pub(crate) fn create_dir_all(dir: &Path, mode: u32) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;
    builder.create(dir)
}

/// Create `dir` if missing, otherwise reset its mode
pub(crate) fn ensure_dir(dir: &Path, mode: u32) -> io::Result<()> {
    match fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => {
            if let Err(e) = set_mode(dir, mode) {
                warn!(path = %dir.display(), error = %e, "Failed to apply directory mode");
            }
            Ok(())
        }
        Ok(_) => Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} exists and is not a directory", dir.display()),
        )),
        Err(e) if e.kind() == io::ErrorKind::NotFound => create_dir_all(dir, mode),
        Err(e) => Err(e),
    }
}

pub(crate) fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode))
    }
    #[cfg(not(unix))]
    {
        let _ = (path, mode);
        Ok(())
    }
}

/// `remove_file` that treats an already missing file as success
pub(crate) fn remove_file_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
