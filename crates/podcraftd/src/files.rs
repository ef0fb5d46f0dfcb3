use std::io::{self, Write};

use camino::Utf8Path;
use tempfile::Builder;

/// Replaces `path` with `contents` through a sibling temporary file.
///
/// The data is fsync'd before the rename, so readers see either the old
/// file or the complete new one.
pub(crate) fn atomic_write(path: &Utf8Path, contents: &[u8]) -> io::Result<()> {
    let directory = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let mut file = Builder::new()
        .prefix(path.file_name().unwrap_or("podcraft"))
        .suffix(".tmp")
        .tempfile_in(directory)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|error| error.error)?;
    Ok(())
}
