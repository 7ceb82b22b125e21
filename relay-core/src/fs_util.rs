//! Small filesystem helpers shared by the relay components.
//!
//! Grounded on `original_source/app/hls_utils.py`: `mkdir_p`, `rmrf`,
//! `atomic_write_text` and `hardlink_or_copy` map directly onto the
//! functions below, re-expressed with `tokio::fs` for the async contexts
//! the tick loop and control surface run in.

use std::path::Path;

use tracing::debug;

use crate::error::Result;

/// Create `path` and all missing parent components; a no-op if it already exists.
pub async fn mkdir_p(path: impl AsRef<Path>) -> Result<()> {
    tokio::fs::create_dir_all(path).await?;
    Ok(())
}

/// Recursively remove `path` if it exists; a no-op otherwise.
pub async fn rmrf(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Write `contents` to `path` via a sibling temp file plus atomic rename, so
/// readers never observe a partially written file (invariant 5).
pub async fn atomic_write(path: impl AsRef<Path>, contents: &str) -> Result<()> {
    let path = path.as_ref();
    let tmp_path = path.with_extension("tmp");
    tokio::fs::write(&tmp_path, contents).await?;
    tokio::fs::rename(&tmp_path, path).await?;
    Ok(())
}

/// Publish `src` as `dst` using a hardlink; fall back to a copy when
/// hardlinking isn't supported (cross-device link, unsupported filesystem).
pub async fn hardlink_or_copy(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> Result<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();
    match tokio::fs::hard_link(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) => {
            debug!(
                src = %src.display(), dst = %dst.display(), error = %e,
                "hardlink failed, falling back to copy"
            );
            tokio::fs::copy(src, dst).await?;
            Ok(())
        }
    }
}

/// Remove a single file, tolerating the "already gone" case silently
/// (cleanup races between eviction and an external cleaner).
pub async fn unlink_tolerant(path: impl AsRef<Path>) {
    let path = path.as_ref();
    if let Err(e) = tokio::fs::remove_file(path).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        debug!(path = %path.display(), error = %e, "failed to remove retired segment file");
    }
}
