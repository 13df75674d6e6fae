//! # Studio Gallery
//!
//! The gallery publishing pipeline of a photography studio's website. An
//! operator stages a curated, ordered, categorized set of images; publishing
//! uploads them to an image host and records one metadata document per image
//! in a document store; the site loads the gallery back from that store (or a
//! local snapshot file) and renders a filterable grid.
//!
//! # Architecture: Stage → Publish → Load
//!
//! ```text
//! 1. Stage     files/dirs  →  StagingSession      (order, categories, previews)
//! 2. Publish   staged set  →  image host + store  (clear, upload all, commit once)
//! 3. Load      store/file  →  GalleryView         (normalize, order, filters)
//! ```
//!
//! Publishing and loading meet only at the metadata store. The store is the
//! source of truth for what is published; the image host only holds bytes.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`staging`] | Pending selections: ordering, categories, previews, JSON export |
//! | [`image_host`] | ImgBB-compatible upload client, direct or through a server proxy |
//! | [`store`] | Metadata store trait, Firestore REST and JSON-file backends, polled subscriptions |
//! | [`publish`] | Upload orchestration: clear, upload in order, one atomic batch commit |
//! | [`loader`] | Source selection: forced local, live store, fallback snapshot |
//! | [`render`] | Records → ordered items and filter set; HTML grid markup via Maud |
//! | [`snapshot`] | Snapshot file parsing from disk or HTTP |
//! | [`server`] | Health endpoint and static file serving (axum) |
//! | [`config`] | `config.toml` loading, validation and merging over stock defaults |
//! | [`types`] | `GalleryRecord`, raw entry normalization, mode enums |
//! | [`naming`] | `NNN-name` filename convention for titles and staging order |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Normalize Once
//!
//! Store documents and snapshot files have accumulated several record shapes
//! over the site's life (bare URL strings, `src` vs `url`, string rotations).
//! All of them are read as [`types::RawEntry`] and normalized into
//! [`types::GalleryRecord`] at the boundary. Rendering never inspects shapes.
//!
//! ## All-or-Nothing Commits
//!
//! Every image is uploaded before any record is written, and the records go
//! out in a single batch. A failed upload leaves the published gallery as it
//! was (minus whatever `clear_all` already removed); a viewer never sees a
//! half-written set.
//!
//! ## Polling Subscriptions
//!
//! Both store backends are reached over plain HTTP or the filesystem, neither
//! of which pushes changes. [`store::Subscription`] polls and yields a
//! snapshot only when it differs from the last one, which gives the loader
//! the same "re-render on every snapshot" contract a push listener would.
//!
//! ## Trait Seams for Remote Services
//!
//! [`image_host::ImageHost`] and [`store::MetadataStore`] are the only places
//! the pipeline talks to the outside world. Tests swap in in-memory
//! implementations and local axum servers.

pub mod config;
pub mod image_host;
pub mod loader;
pub mod naming;
pub mod output;
pub mod publish;
pub mod render;
pub mod server;
pub mod snapshot;
pub mod staging;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
