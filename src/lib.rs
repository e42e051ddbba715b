//! # slidecache
//!
//! An offline library for zip-packaged HTML presentations.
//!
//! slidecache downloads presentations from a remote catalog, persists the
//! raw archives in a local object store, and on playback turns a stored zip
//! into a single self-contained HTML document: an entry-point page with all
//! same-archive asset references rewritten to inline `data:` URIs, ready for
//! a sandboxed viewer that makes no further network requests.
//!
//! ## Pipeline
//!
//! [`Fetcher`] → raw bytes → [`ObjectStore`] (persist) → on playback →
//! [`ZipArchive`] → entry list → [`Resolver`] → rewritten document plus
//! resource handles.
//!
//! ## Example
//!
//! ```no_run
//! use slidecache::Library;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), slidecache::Error> {
//!     let library = Library::open("https://example.test/lib", ".slidecache").await?;
//!
//!     for entry in library.catalog().await? {
//!         println!("{}: {}", entry.title, entry.size_label);
//!     }
//!
//!     library.download("demo.zip", &mut |pct| eprintln!("{pct}%")).await?;
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod cli;
pub mod error;
pub mod fetch;
pub mod library;
pub mod resolve;
pub mod store;
pub mod zip;

pub use catalog::{CatalogEntry, ItemState};
pub use cli::{Cli, Command};
pub use error::{Error, Result};
pub use fetch::Fetcher;
pub use library::Library;
pub use resolve::{PlaybackGate, PlaybackSession, RenderableDocument, Resolver, ResourceHandle};
pub use store::ObjectStore;
pub use zip::{ArchiveEntry, CompressionMethod, ZipArchive};
