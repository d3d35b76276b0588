use crate::error::{Result, TemploaderError};
use serde_json::Value;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Reads the contents of a file at the given path
///
/// # Errors
///
/// - `TemploaderError::FileNotFound` if the path doesn't exist or isn't a file.
/// - `TemploaderError::Io` if there's an error reading the file.
pub fn read_file_contents(path: &Path) -> Result<String> {
    if !path.is_file() {
        return Err(TemploaderError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    fs::read_to_string(path).map_err(std::convert::Into::into)
}

/// Reads a JSON configuration file holding loader options or option packs
///
/// # Errors
///
/// - `TemploaderError::FileNotFound` if the file doesn't exist.
/// - `TemploaderError::Json` if the file is not valid JSON.
pub fn read_config(path: &Path) -> Result<Value> {
    let contents = read_file_contents(path)?;
    serde_json::from_str(&contents).map_err(Into::into)
}

/// Makes `path` absolute against the working directory and folds `.` and `..`
/// components without touching the filesystem.
///
/// # Errors
///
/// Returns `TemploaderError::Io` if the working directory cannot be determined.
pub fn normalize_path(path: &Path) -> Result<PathBuf> {
    let absolute = std::path::absolute(path)?;
    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    Ok(normalized)
}

/// Path of `to` relative to `from`, joined with `/` for display in templates.
///
/// # Errors
///
/// Returns `TemploaderError::Io` if either path cannot be made absolute.
pub fn relative_display_path(from: &Path, to: &Path) -> Result<String> {
    let from = normalize_path(from)?;
    let to = normalize_path(to)?;

    let from_parts: Vec<_> = from.components().collect();
    let to_parts: Vec<_> = to.components().collect();
    let common = from_parts
        .iter()
        .zip(&to_parts)
        .take_while(|(a, b)| a == b)
        .count();

    let ups = std::iter::repeat_n("..".to_string(), from_parts.len() - common);
    let downs = to_parts[common..]
        .iter()
        .map(|part| part.as_os_str().to_string_lossy().into_owned());

    Ok(ups.chain(downs).collect::<Vec<_>>().join("/"))
}
