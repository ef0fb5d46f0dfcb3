//! Copying and hashing directory trees.
//!
//! Both walks visit entries in file-name order so the digest of a tree does
//! not depend on the order the filesystem returns them in. Directories,
//! regular files and symlinks are captured; links are recreated with their
//! original target and never followed. Any other entry fails the walk.

use std::fs::{self, File};
use std::io;
use std::path::PathBuf;

use camino::{Utf8Path, Utf8PathBuf};
use sha2::{Digest, Sha256};
use walkdir::{DirEntry, WalkDir};

use super::errors::TreeError;
use crate::cancel::CancelToken;

/// Size, file count and checksum of a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TreeDigest {
    pub checksum: String,
    pub size_bytes: u64,
    pub file_count: u64,
}

/// Copies every directory, regular file and symlink under `from` into `to`.
///
/// `to` must exist. The cancel token is checked before each file and link.
pub(crate) fn copy_tree(from: &Utf8Path, to: &Utf8Path, cancel: &CancelToken) -> Result<(), TreeError> {
    for entry in walk(from) {
        let entry = entry?;
        let relative = relative_path(from, &entry)?;
        let target = to.join(&relative);
        let kind = entry.file_type();
        if kind.is_dir() {
            fs::create_dir_all(&target).map_err(|source| io_error("create directory", &target, source))?;
        } else if kind.is_file() {
            if cancel.is_cancelled() {
                return Err(TreeError::Cancelled);
            }
            fs::copy(entry.path(), &target).map_err(|source| io_error("copy file to", &target, source))?;
        } else if kind.is_symlink() {
            if cancel.is_cancelled() {
                return Err(TreeError::Cancelled);
            }
            let link = read_link(from, &relative)?;
            std::os::unix::fs::symlink(&link, &target).map_err(|source| io_error("create symlink", &target, source))?;
        } else {
            return Err(unsupported(from, &relative));
        }
    }
    Ok(())
}

/// SHA-256 over the relative paths, kinds, lengths and contents of a tree.
///
/// Symlinks contribute their target text; they count towards `file_count`
/// but not `size_bytes`.
pub(crate) fn digest_tree(root: &Utf8Path, cancel: &CancelToken) -> Result<TreeDigest, TreeError> {
    let mut hasher = Sha256::new();
    let mut size_bytes = 0_u64;
    let mut file_count = 0_u64;
    for entry in walk(root) {
        let entry = entry?;
        let relative = relative_path(root, &entry)?;
        let kind = entry.file_type();
        if kind.is_dir() {
            hasher.update(b"d\0");
            hasher.update(relative.as_str().as_bytes());
            hasher.update(b"\0");
        } else if kind.is_file() {
            if cancel.is_cancelled() {
                return Err(TreeError::Cancelled);
            }
            let path = root.join(&relative);
            let mut file = File::open(&path).map_err(|source| io_error("open", &path, source))?;
            let length = file
                .metadata()
                .map_err(|source| io_error("stat", &path, source))?
                .len();
            hasher.update(b"f\0");
            hasher.update(relative.as_str().as_bytes());
            hasher.update(b"\0");
            hasher.update(length.to_be_bytes());
            let copied = io::copy(&mut file, &mut hasher).map_err(|source| io_error("read", &path, source))?;
            if copied != length {
                return Err(io_error(
                    "read",
                    &path,
                    io::Error::new(io::ErrorKind::UnexpectedEof, "file changed while hashing"),
                ));
            }
            size_bytes += length;
            file_count += 1;
        } else if kind.is_symlink() {
            if cancel.is_cancelled() {
                return Err(TreeError::Cancelled);
            }
            let link = read_link(root, &relative)?;
            hasher.update(b"l\0");
            hasher.update(relative.as_str().as_bytes());
            hasher.update(b"\0");
            hasher.update(link.as_os_str().as_encoded_bytes());
            hasher.update(b"\0");
            file_count += 1;
        } else {
            return Err(unsupported(root, &relative));
        }
    }
    Ok(TreeDigest {
        checksum: format!("{:x}", hasher.finalize()),
        size_bytes,
        file_count,
    })
}

fn walk(root: &Utf8Path) -> walkdir::IntoIter {
    WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
}

fn relative_path(root: &Utf8Path, entry: &DirEntry) -> Result<Utf8PathBuf, TreeError> {
    let relative = entry
        .path()
        .strip_prefix(root.as_std_path())
        .unwrap_or_else(|_| entry.path());
    Utf8PathBuf::from_path_buf(relative.to_path_buf()).map_err(|path| TreeError::NonUtf8Path { path })
}

fn read_link(root: &Utf8Path, relative: &Utf8Path) -> Result<PathBuf, TreeError> {
    let path = root.join(relative);
    fs::read_link(&path).map_err(|source| io_error("read symlink", &path, source))
}

fn unsupported(root: &Utf8Path, relative: &Utf8Path) -> TreeError {
    let path = root.join(relative);
    io_error(
        "capture",
        &path,
        io::Error::new(io::ErrorKind::Unsupported, "entry is not a file, directory or symlink"),
    )
}

fn io_error(action: &'static str, path: &Utf8Path, source: io::Error) -> TreeError {
    TreeError::Io {
        action,
        path: path.to_path_buf(),
        source,
    }
}
