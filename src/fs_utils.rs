//! Filesystem utility functions
//!
//! Every file ccrotate writes (its own store and Claude's active-state files)
//! goes through [`atomic_write`], so readers only ever see the old or the new
//! contents.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{Result, RotateError};

/// Sibling temp path used while a file is being replaced
pub fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write `contents` to `path` via a temp sibling and a rename.
///
/// Files are created with mode 0600 on unix since they hold tokens.
pub fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(RotateError::io("create directory", parent))?;
    }

    let temp_path = temp_path_for(path);
    fs::write(&temp_path, contents).map_err(RotateError::io("write", &temp_path))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&temp_path, fs::Permissions::from_mode(0o600))
            .map_err(RotateError::io("set permissions on", &temp_path))?;
    }

    fs::rename(&temp_path, path).map_err(RotateError::io("replace", path))
}

/// Read a file, mapping "does not exist" to `None`
pub fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(RotateError::io("read", path)(e)),
    }
}

/// Remove a file if present
pub fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(RotateError::io("remove", path)(e)),
    }
}
