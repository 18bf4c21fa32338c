//! # Sdstash Architecture
//!
//! Sdstash is the **local image record store** behind a Stable-Diffusion control
//! panel. Every generated image it is handed gets stored, tagged by an external
//! tagging model, and indexed, so the collection can later be searched by tag.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Record Store (recorder.rs)                                 │
//! │  - put_image / save / query_with_tags / list_tags           │
//! │  - Owns the in-memory records, tag index and dirty flag     │
//! └─────────────────────────────────────────────────────────────┘
//!          │                 │                   │
//!          ▼                 ▼                   ▼
//! ┌────────────────┐ ┌────────────────┐ ┌─────────────────────────┐
//! │ tagger.rs      │ │ sdmeta.rs      │ │ tags/                   │
//! │ TagExtractor   │ │ WebUI params   │ │ reference db, counts,   │
//! │ (external)     │ │ text parser    │ │ queries, tag info       │
//! └────────────────┘ └────────────────┘ └─────────────────────────┘
//!          │
//!          ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Storage Layer (store/)                                     │
//! │  - BlobStore: PNG bytes with embedded parameters            │
//! │  - RecordBackend: records.json + tags.json                  │
//! │  - Fs* (production), Mem* (testing)                         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every collaborator of the record store is a trait object handed in at
//! construction, so the whole pipeline runs in tests without a model or a disk.
//! [`ImageRecorder::from_config`] wires the production pieces.
//!
//! ## Key Principle: Explicit Persistence
//!
//! Ingestion only changes memory. Durable files are written on [`ImageRecorder::save`],
//! and a save with nothing new is a no-op. Callers decide when to save, typically
//! after a generation batch.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use sdstash::{ImageRecorder, StashConfig, TagExtractor};
//!
//! # fn tagger() -> Arc<dyn TagExtractor> { unimplemented!() }
//! # fn main() -> sdstash::Result<()> {
//! let config = StashConfig::load(None)?;
//! let recorder = ImageRecorder::from_config(&config, tagger())?;
//! for image in recorder.query_with_tags(&["cat_ears"], &["dog"])? {
//!     println!("{}x{}", image.width(), image.height());
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod model;
pub mod png_text;
pub mod recorder;
pub mod sdmeta;
pub mod store;
pub mod tagger;
pub mod tags;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

pub use config::StashConfig;
pub use error::{Result, StashError};
pub use model::{GeneratedImage, ImageRecord, TagTokens};
pub use recorder::{Collaborators, ImageRecorder};
pub use sdmeta::{MetadataParser, ParsedMeta, WebuiParametersParser};
pub use tagger::{TagExtractor, TagGroups};
pub use tags::{TagInfo, TagQuery, TagStat, TagType};
