//! Turns an opened archive into a self-contained, sandboxable HTML document.
//!
//! Resolution picks an entry-point document, materializes a data-URI
//! [`ResourceHandle`] for every recognized asset in the archive, and rewrites
//! the document's `src`/`href` references to point at those handles. The
//! result needs no network access to render.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::zip::ZipArchive;

/// A playable in-memory resource backed by an archive entry.
///
/// The locator is a `data:` URI, directly usable as the value of an HTML
/// `src`/`href` attribute. It is valid for the lifetime of the session that
/// created it; dropping the session releases the backing memory.
#[derive(Debug, Clone)]
pub struct ResourceHandle {
    pub source_path: String,
    pub mime_type: String,
    pub locator: String,
}

impl ResourceHandle {
    fn materialize(source_path: &str, mime_type: &str, bytes: &[u8]) -> Self {
        let locator = format!("data:{mime_type};base64,{}", BASE64.encode(bytes));
        Self {
            source_path: source_path.to_string(),
            mime_type: mime_type.to_string(),
            locator,
        }
    }
}

/// The document handed to the viewer: rewritten HTML plus a display title.
///
/// Owns no resources itself; handles belong to the session.
#[derive(Debug, Clone)]
pub struct RenderableDocument {
    pub title: String,
    pub html_text: String,
}

/// Mutual-exclusion guard around playback resolution.
///
/// At most one resolution token is outstanding system-wide; a second request
/// while one is live is rejected with [`Error::Busy`]. Clone to share the
/// gate between callers.
#[derive(Clone, Default)]
pub struct PlaybackGate {
    active: Arc<AtomicBool>,
}

impl PlaybackGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the resolution token, failing if one is already outstanding.
    pub fn try_begin(&self) -> Result<SessionToken> {
        if self
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::Busy);
        }
        Ok(SessionToken {
            active: Arc::clone(&self.active),
        })
    }
}

/// Token proving exclusive ownership of the playback slot.
///
/// Released on drop, which happens when the owning session ends or a failed
/// resolution unwinds.
#[derive(Debug)]
pub struct SessionToken {
    active: Arc<AtomicBool>,
}

impl Drop for SessionToken {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
    }
}

/// One playback session: the rewritten document plus every handle created
/// for it.
///
/// Dropping the session releases all handles and frees the playback slot for
/// the next resolution.
#[derive(Debug)]
pub struct PlaybackSession {
    document: RenderableDocument,
    handles: Vec<ResourceHandle>,
    _token: SessionToken,
}

impl PlaybackSession {
    pub fn document(&self) -> &RenderableDocument {
        &self.document
    }

    pub fn handles(&self) -> &[ResourceHandle] {
        &self.handles
    }

    /// Explicitly end the session, releasing every handle it created.
    pub fn release(self) {}
}

/// Map a file extension to the content type of a known binary-asset class.
///
/// Entries with unrecognized extensions are deliberately left unresolved:
/// they are neither rewritten nor materialized as handles.
fn classify(path: &str) -> Option<&'static str> {
    let name = path.rsplit('/').next().unwrap_or(path);
    let (_, ext) = name.rsplit_once('.')?;
    let mime = match ext.to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "ico" => "image/x-icon",
        "css" => "text/css",
        "js" => "text/javascript",
        _ => return None,
    };
    Some(mime)
}

/// Select the entry-point document path.
///
/// A file literally named `index.html` (case-insensitive, any depth) wins;
/// otherwise the first entry in archive order whose path ends in `.html` or
/// `.htm`. This is the one place a case-insensitive lookup is used.
fn find_entry_point(archive: &ZipArchive) -> Option<String> {
    for entry in archive.entries() {
        let name = entry.path.rsplit('/').next().unwrap_or(&entry.path);
        if name.eq_ignore_ascii_case("index.html") {
            return Some(entry.path.clone());
        }
    }

    archive
        .entries()
        .find(|e| {
            let lower = e.path.to_ascii_lowercase();
            lower.ends_with(".html") || lower.ends_with(".htm")
        })
        .map(|e| e.path.clone())
}

/// Rewrite `src`/`href` attributes referencing `path` to use `locator`.
///
/// Matching is exact-string based: the attribute value must equal the
/// archive-relative path, optionally prefixed with a single `./`. Paths that
/// differ by directory traversal, query strings, or case are left untouched.
fn rewrite_references(html: &str, path: &str, locator: &str) -> String {
    let mut text = html.to_string();

    for attr in ["src", "href"] {
        let replacement = format!("{attr}=\"{locator}\"");
        for quote in ['"', '\''] {
            for value in [path.to_string(), format!("./{path}")] {
                let needle = format!("{attr}={quote}{value}{quote}");
                text = text.replace(&needle, &replacement);
            }
        }
    }

    text
}

/// Content resolver: archive in, sandboxable document out.
pub struct Resolver {
    gate: PlaybackGate,
}

impl Resolver {
    pub fn new(gate: PlaybackGate) -> Self {
        Self { gate }
    }

    /// Resolve an opened archive into a playback session.
    ///
    /// `title` comes from the caller's catalog metadata, not from the
    /// document.
    ///
    /// # Errors
    ///
    /// [`Error::Busy`] if another session is live, [`Error::NoEntryPoint`]
    /// if the archive holds no HTML document, [`Error::CorruptArchive`] if
    /// an entry fails to decompress. A failure partway through asset
    /// materialization aborts the whole resolution; handles created so far
    /// are dropped with the unwound state, so nothing leaks.
    pub fn resolve(&self, archive: &ZipArchive, title: &str) -> Result<PlaybackSession> {
        let token = self.gate.try_begin()?;

        let entry_point = find_entry_point(archive).ok_or(Error::NoEntryPoint)?;
        debug!("entry point: {entry_point}");

        let mut html = archive.read_text(&entry_point)?;

        // One handle per source path, in archive order.
        let mut handles: Vec<ResourceHandle> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for entry in archive.entries() {
            if entry.path == entry_point || !seen.insert(entry.path.clone()) {
                continue;
            }
            let Some(mime) = classify(&entry.path) else {
                continue;
            };

            let bytes = archive.read_binary(&entry.path)?;
            let handle = ResourceHandle::materialize(&entry.path, mime, &bytes);
            trace!("materialized {} as {mime}", entry.path);
            handles.push(handle);
        }

        for handle in &handles {
            html = rewrite_references(&html, &handle.source_path, &handle.locator);
        }

        debug!("resolved \"{title}\": {} handles", handles.len());

        Ok(PlaybackSession {
            document: RenderableDocument {
                title: title.to_string(),
                html_text: html,
            },
            handles,
            _token: token,
        })
    }
}
