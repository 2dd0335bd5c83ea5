//! Protocol logic shared by the responder and the client driver
//!
//! Path policy for filenames received over the wire, and byte-range
//! resolution against a file's live length.

use std::path::{Component, Path, PathBuf};

use crate::error::{SessionError, SessionResult};

fn reject(p: &str, reason: impl Into<String>) -> SessionError {
    SessionError::InvalidPath {
        path: p.to_string(),
        reason: reason.into(),
    }
}

/// Resolve a wire filename to a path safely under `root`.
/// Rejects empty names, NUL bytes, absolute paths and `..` components, and
/// canonicalizes what already exists so symlinks cannot escape the root.
pub fn normalize_under_root(root: &Path, name: &str) -> SessionResult<PathBuf> {
    use Component::{CurDir, Normal, ParentDir, Prefix, RootDir};

    if name.contains('\0') {
        return Err(reject(name, "contains NUL byte"));
    }

    let mut safe = PathBuf::new();
    for component in Path::new(name).components() {
        match component {
            CurDir => {}
            Normal(s) => {
                // ADS defense
                #[cfg(windows)]
                if s.to_string_lossy().contains(':') {
                    return Err(reject(name, "component contains colon"));
                }
                safe.push(s);
            }
            ParentDir | RootDir | Prefix(_) => {
                return Err(reject(name, format!("disallowed component {:?}", component)));
            }
        }
    }
    if safe.as_os_str().is_empty() {
        return Err(reject(name, "empty filename"));
    }

    let canon_root = std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
    let joined = canon_root.join(&safe);

    // Resolve the deepest ancestor that exists (a symlink counts, even a
    // dangling one). Components below it are created later, under it.
    let mut existing = joined.as_path();
    let mut pending = Vec::new();
    while std::fs::symlink_metadata(existing).is_err() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(part)) => {
                pending.push(part);
                existing = parent;
            }
            _ => break,
        }
    }
    let mut final_path = std::fs::canonicalize(existing)
        .map_err(|e| reject(name, format!("cannot resolve {}: {}", existing.display(), e)))?;
    if !final_path.starts_with(&canon_root) {
        return Err(reject(name, "escapes storage root"));
    }
    for part in pending.iter().rev() {
        final_path.push(part);
    }
    Ok(final_path)
}

/// Create parent directory if needed
pub fn ensure_parent_exists(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// A validated slice of a file: `len` bytes starting at `offset`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Window {
    pub offset: u64,
    pub len: u64,
}

/// Resolve the wire pair (skip count, end index) against a file of `file_len`
/// bytes. `None` means the range is invalid.
///
/// Negative skip reads from the start, `end <= 0` reads to end of file.
/// A bounded end must lie after the skip and must not pass the file's end.
pub fn resolve_window(file_len: u64, skip: i64, end: i64) -> Option<Window> {
    let skip = skip.max(0) as u64;
    if skip > 0 && skip >= file_len {
        return None;
    }
    let stop = if end > 0 {
        let end = end as u64;
        if end <= skip || end > file_len {
            return None;
        }
        end
    } else {
        file_len
    };
    Some(Window {
        offset: skip,
        len: stop - skip,
    })
}

/// Encode a 1-indexed inclusive range for the wire.
/// A start below 1 becomes skip 0; an end below 1 becomes the unbounded sentinel.
pub fn encode_range(start: Option<i64>, end: Option<i64>) -> (i64, i64) {
    let skip = start.map(|s| (s - 1).max(0)).unwrap_or(0);
    let end = match end {
        Some(e) if e > 0 => e,
        _ => crate::protocol::END_UNBOUNDED,
    };
    (skip, end)
}
