//! # Storage Layer
//!
//! Two independent seams sit under the record store:
//!
//! 1. **Blobs** ([`blob::BlobStore`]): the raw PNG bytes of each image, addressed by
//!    a generated filename.
//! 2. **Records** ([`backend::RecordBackend`]): the durable copy of the record list
//!    and the tag-count index.
//!
//! ## Durability Model
//!
//! The record store keeps everything in memory and only calls the record backend
//! on an explicit save. Each save rewrites both files in full. Every file write goes
//! to a temporary name in the same directory first and is then renamed over the
//! target, so a crash leaves either the old file or the new one, never a partial
//! write. The two files are not written as one transaction.
//!
//! ## Implementations
//!
//! - [`fs_blob::FsBlobStore`] and [`fs_backend::FsBackend`]: production, on disk.
//! - [`mem_blob::MemBlobStore`] and [`mem_backend::MemBackend`]: in memory, for
//!   tests. Both can simulate write failures.
//!
//! ## Storage Layout
//!
//! ```text
//! <storage_dir>/
//! └── 3f2a9c1e/
//!     └── 3f2a9c1e....png      # PNG with a `parameters` text chunk
//!
//! <records_dir>/
//! ├── records.json             # one row per ImageRecord (see `table`)
//! └── tags.json                # one row per TagStat
//! ```
//!
//! The two directories may be the same.

pub mod backend;
pub mod blob;
pub mod fs_backend;
pub mod fs_blob;
pub mod mem_backend;
pub mod mem_blob;
pub mod table;

use std::fs;
use std::path::Path;

use uuid::Uuid;

use crate::error::Result;

pub use backend::RecordBackend;
pub use blob::BlobStore;
pub use fs_backend::FsBackend;
pub use fs_blob::FsBlobStore;
pub use mem_backend::MemBackend;
pub use mem_blob::MemBlobStore;

/// Writes `content` to `target` through a temporary sibling and a rename.
pub(crate) fn atomic_write(target: &Path, content: &[u8]) -> Result<()> {
    let dir = target.parent().unwrap_or_else(|| Path::new("."));
    if !dir.as_os_str().is_empty() && !dir.exists() {
        fs::create_dir_all(dir)?;
    }
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = dir.join(format!(".{}-{}.tmp", name, Uuid::new_v4()));
    fs::write(&tmp, content)?;
    if let Err(e) = fs::rename(&tmp, target) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}
