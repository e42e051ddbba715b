//! End-to-end pipeline tests: catalog fetch, streaming download, local
//! store, archive extraction, and playback resolution.

use slidecache::{
    CatalogEntry, Error, Fetcher, ItemState, Library, PlaybackGate, Resolver, ZipArchive,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Minimal zip writer for test fixtures: local headers, central directory,
/// EOCD. Enough of the format for the reader under test, nothing more.
mod zipfix {
    use std::io::Read;

    pub struct Entry<'a> {
        pub name: &'a str,
        pub data: &'a [u8],
        pub deflate: bool,
    }

    impl<'a> Entry<'a> {
        pub fn stored(name: &'a str, data: &'a [u8]) -> Self {
            Self {
                name,
                data,
                deflate: false,
            }
        }

        pub fn deflated(name: &'a str, data: &'a [u8]) -> Self {
            Self {
                name,
                data,
                deflate: true,
            }
        }
    }

    pub fn build(entries: &[Entry<'_>]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut central = Vec::new();

        for entry in entries {
            let crc = crc32fast::hash(entry.data);
            let payload = if entry.deflate {
                let mut compressed = Vec::new();
                flate2::read::DeflateEncoder::new(entry.data, flate2::Compression::default())
                    .read_to_end(&mut compressed)
                    .unwrap();
                compressed
            } else {
                entry.data.to_vec()
            };
            let zip_method: u16 = if entry.deflate { 8 } else { 0 };
            let lfh_offset = out.len() as u32;

            // Local file header
            out.extend_from_slice(b"PK\x03\x04");
            out.extend_from_slice(&20u16.to_le_bytes()); // version needed
            out.extend_from_slice(&0u16.to_le_bytes()); // flags
            out.extend_from_slice(&zip_method.to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes()); // mod time
            out.extend_from_slice(&0u16.to_le_bytes()); // mod date
            out.extend_from_slice(&crc.to_le_bytes());
            out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            out.extend_from_slice(&(entry.data.len() as u32).to_le_bytes());
            out.extend_from_slice(&(entry.name.len() as u16).to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes()); // extra len
            out.extend_from_slice(entry.name.as_bytes());
            out.extend_from_slice(&payload);

            // Matching central directory header
            central.extend_from_slice(b"PK\x01\x02");
            central.extend_from_slice(&20u16.to_le_bytes()); // version made by
            central.extend_from_slice(&20u16.to_le_bytes()); // version needed
            central.extend_from_slice(&0u16.to_le_bytes()); // flags
            central.extend_from_slice(&zip_method.to_le_bytes());
            central.extend_from_slice(&0u16.to_le_bytes()); // mod time
            central.extend_from_slice(&0u16.to_le_bytes()); // mod date
            central.extend_from_slice(&crc.to_le_bytes());
            central.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            central.extend_from_slice(&(entry.data.len() as u32).to_le_bytes());
            central.extend_from_slice(&(entry.name.len() as u16).to_le_bytes());
            central.extend_from_slice(&0u16.to_le_bytes()); // extra len
            central.extend_from_slice(&0u16.to_le_bytes()); // comment len
            central.extend_from_slice(&0u16.to_le_bytes()); // disk number
            central.extend_from_slice(&0u16.to_le_bytes()); // internal attrs
            central.extend_from_slice(&0u32.to_le_bytes()); // external attrs
            central.extend_from_slice(&lfh_offset.to_le_bytes());
            central.extend_from_slice(entry.name.as_bytes());
        }

        let cd_offset = out.len() as u32;
        let cd_size = central.len() as u32;
        out.extend_from_slice(&central);

        // End of central directory
        out.extend_from_slice(b"PK\x05\x06");
        out.extend_from_slice(&0u16.to_le_bytes()); // disk number
        out.extend_from_slice(&0u16.to_le_bytes()); // disk with cd
        out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
        out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
        out.extend_from_slice(&cd_size.to_le_bytes());
        out.extend_from_slice(&cd_offset.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes()); // comment len

        out
    }

    /// Single-entry archive in ZIP64 form: the central directory header
    /// carries 0xFFFFFFFF sentinels with the real values in an 0x0001 extra
    /// field, and the EOCD defers to a ZIP64 EOCD through its locator.
    pub fn build_zip64(name: &str, data: &[u8]) -> Vec<u8> {
        let crc = crc32fast::hash(data);
        let mut out = Vec::new();

        // Plain local file header, STORED
        out.extend_from_slice(b"PK\x03\x04");
        out.extend_from_slice(&45u16.to_le_bytes()); // version needed
        out.extend_from_slice(&0u16.to_le_bytes()); // flags
        out.extend_from_slice(&0u16.to_le_bytes()); // method
        out.extend_from_slice(&0u16.to_le_bytes()); // mod time
        out.extend_from_slice(&0u16.to_le_bytes()); // mod date
        out.extend_from_slice(&crc.to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(&(name.len() as u16).to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes()); // extra len
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(data);

        // Central directory header with ZIP64 sentinels
        let cd_offset = out.len() as u64;
        out.extend_from_slice(b"PK\x01\x02");
        out.extend_from_slice(&45u16.to_le_bytes()); // version made by
        out.extend_from_slice(&45u16.to_le_bytes()); // version needed
        out.extend_from_slice(&0u16.to_le_bytes()); // flags
        out.extend_from_slice(&0u16.to_le_bytes()); // method
        out.extend_from_slice(&0u16.to_le_bytes()); // mod time
        out.extend_from_slice(&0u16.to_le_bytes()); // mod date
        out.extend_from_slice(&crc.to_le_bytes());
        out.extend_from_slice(&0xFFFF_FFFFu32.to_le_bytes()); // compressed
        out.extend_from_slice(&0xFFFF_FFFFu32.to_le_bytes()); // uncompressed
        out.extend_from_slice(&(name.len() as u16).to_le_bytes());
        out.extend_from_slice(&28u16.to_le_bytes()); // extra len
        out.extend_from_slice(&0u16.to_le_bytes()); // comment len
        out.extend_from_slice(&0u16.to_le_bytes()); // disk number
        out.extend_from_slice(&0u16.to_le_bytes()); // internal attrs
        out.extend_from_slice(&0u32.to_le_bytes()); // external attrs
        out.extend_from_slice(&0xFFFF_FFFFu32.to_le_bytes()); // lfh offset
        out.extend_from_slice(name.as_bytes());
        // ZIP64 extended information extra field
        out.extend_from_slice(&0x0001u16.to_le_bytes());
        out.extend_from_slice(&24u16.to_le_bytes());
        out.extend_from_slice(&(data.len() as u64).to_le_bytes()); // uncompressed
        out.extend_from_slice(&(data.len() as u64).to_le_bytes()); // compressed
        out.extend_from_slice(&0u64.to_le_bytes()); // lfh offset
        let cd_size = out.len() as u64 - cd_offset;

        // ZIP64 end of central directory + locator
        let eocd64_offset = out.len() as u64;
        out.extend_from_slice(b"PK\x06\x06");
        out.extend_from_slice(&44u64.to_le_bytes()); // record size
        out.extend_from_slice(&45u16.to_le_bytes()); // version made by
        out.extend_from_slice(&45u16.to_le_bytes()); // version needed
        out.extend_from_slice(&0u32.to_le_bytes()); // disk number
        out.extend_from_slice(&0u32.to_le_bytes()); // disk with cd
        out.extend_from_slice(&1u64.to_le_bytes()); // disk entries
        out.extend_from_slice(&1u64.to_le_bytes()); // total entries
        out.extend_from_slice(&cd_size.to_le_bytes());
        out.extend_from_slice(&cd_offset.to_le_bytes());

        out.extend_from_slice(b"PK\x06\x07");
        out.extend_from_slice(&0u32.to_le_bytes()); // disk with eocd64
        out.extend_from_slice(&eocd64_offset.to_le_bytes());
        out.extend_from_slice(&1u32.to_le_bytes()); // total disks

        // Sentinel-filled EOCD deferring to the ZIP64 record
        out.extend_from_slice(b"PK\x05\x06");
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0xFFFFu16.to_le_bytes());
        out.extend_from_slice(&0xFFFFu16.to_le_bytes());
        out.extend_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
        out.extend_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());

        out
    }
}

fn demo_entry(key: &str, title: &str) -> CatalogEntry {
    CatalogEntry {
        id: key.to_string(),
        key: key.to_string(),
        title: title.to_string(),
        size_label: "Unknown".to_string(),
        thumbnail: None,
    }
}

/// The full spec scenario: manifest at the base URL, download into the
/// store, resolve the stored archive, and observe the rewritten reference.
#[tokio::test]
async fn manifest_download_store_and_resolve() {
    let server = MockServer::start().await;
    let base = format!("{}/lib", server.uri());

    Mock::given(method("GET"))
        .and(path("/lib/catalog.json"))
        .respond_with(
            ResponseTemplate::new(200).set_body_bytes(br#"[{"file":"demo.zip","title":"Demo"}]"#),
        )
        .mount(&server)
        .await;

    let archive = zipfix::build(&[
        zipfix::Entry::stored(
            "index.html",
            br#"<html><head><link href="style.css"></head></html>"#,
        ),
        zipfix::Entry::deflated("style.css", b"body { background: #123456; }"),
    ]);

    Mock::given(method("GET"))
        .and(path("/lib/demo.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(archive.clone()))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let library = Library::open(base, dir.path()).await.unwrap();

    let catalog = library.catalog().await.unwrap();
    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog[0].key, "demo.zip");
    assert_eq!(catalog[0].title, "Demo");
    assert_eq!(catalog[0].size_label, "Unknown");

    let mut percents = Vec::new();
    library
        .download("demo.zip", &mut |pct| percents.push(pct))
        .await
        .unwrap();

    // Monotone progress ending at completion
    assert!(percents.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(percents.last().copied(), Some(100));

    assert_eq!(library.status("demo.zip").await, ItemState::Ready);
    assert!(library.stored_keys().unwrap().contains(&"demo.zip".to_string()));

    let session = library.play(&catalog[0]).await.unwrap();
    let doc = session.document();
    assert_eq!(doc.title, "Demo");
    assert!(!doc.html_text.contains(r#"href="style.css""#));
    assert!(doc.html_text.contains("data:text/css;base64,"));
    assert_eq!(session.handles().len(), 1);
    assert_eq!(session.handles()[0].source_path, "style.css");
}

#[tokio::test]
async fn missing_archive_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing.zip"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let fetcher = Fetcher::new(server.uri()).unwrap();
    let err = fetcher.fetch("missing.zip").await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
}

#[tokio::test]
async fn server_error_is_network_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flaky.zip"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let fetcher = Fetcher::new(server.uri()).unwrap();
    let err = fetcher.fetch("flaky.zip").await.unwrap_err();
    assert!(matches!(err, Error::Network { .. }));
}

#[tokio::test]
async fn progress_is_monotone_and_reaches_total() {
    let server = MockServer::start().await;
    let body = vec![7u8; 64 * 1024];

    Mock::given(method("GET"))
        .and(path("/big.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .mount(&server)
        .await;

    let fetcher = Fetcher::new(server.uri()).unwrap();
    let mut updates: Vec<(u64, u64)> = Vec::new();
    let bytes = fetcher
        .fetch_with_progress("big.zip", &mut |received, total| {
            updates.push((received, total));
        })
        .await
        .unwrap();

    assert_eq!(bytes, body);
    assert!(!updates.is_empty());
    assert!(updates.windows(2).all(|w| w[0].0 <= w[1].0));

    let (received, total) = *updates.last().unwrap();
    assert_eq!(received, body.len() as u64);
    assert_eq!(received, total);
}

#[test]
fn truncated_zip_is_corrupt_never_empty() {
    let archive = zipfix::build(&[
        zipfix::Entry::stored("index.html", b"<html></html>"),
        zipfix::Entry::stored("style.css", &[0u8; 200]),
    ]);
    let truncated = archive[..archive.len() - 100].to_vec();

    let err = ZipArchive::open(truncated).unwrap_err();
    assert!(matches!(err, Error::CorruptArchive(_)));
}

#[test]
fn deflated_entry_round_trips_with_integrity_checks() {
    let css = b"body { margin: 0; } /* enough text to be worth deflating */".repeat(20);
    let archive = zipfix::build(&[zipfix::Entry::deflated("style.css", &css)]);

    let archive = ZipArchive::open(archive).unwrap();
    assert_eq!(archive.read_binary("style.css").unwrap(), css);
}

#[test]
fn tampered_payload_fails_crc_check() {
    let data = b"const answer = 42;".repeat(8);
    let mut raw = zipfix::build(&[zipfix::Entry::stored("app.js", &data)]);

    // Flip a payload byte inside the stored data region (after the 30-byte
    // local header and the name).
    let payload_start = 30 + "app.js".len();
    raw[payload_start + 3] ^= 0xFF;

    let archive = ZipArchive::open(raw).unwrap();
    assert!(matches!(
        archive.read_binary("app.js"),
        Err(Error::CorruptArchive(_))
    ));
}

#[test]
fn zip64_archive_resolves_through_sentinel_chain() {
    let html = b"<html>zip64 deck</html>";
    let raw = zipfix::build_zip64("index.html", html);

    let archive = ZipArchive::open(raw).unwrap();
    assert_eq!(archive.entries().count(), 1);
    assert_eq!(archive.read_binary("index.html").unwrap(), html);

    let resolver = Resolver::new(PlaybackGate::new());
    let session = resolver.resolve(&archive, "Deck").unwrap();
    assert_eq!(session.document().html_text, "<html>zip64 deck</html>");
}

#[test]
fn zip64_with_absurd_entry_count_is_corrupt_not_a_panic() {
    // A valid ZIP64 tail whose record claims far more entries than the
    // central directory could hold must fail cleanly on open.
    let mut raw = zipfix::build_zip64("index.html", b"<html></html>");

    // The ZIP64 EOCD sits 98 bytes from the end (56 + 20 + 22); its entry
    // count fields are at offsets 24 and 32 within the record.
    let eocd64_start = raw.len() - 98;
    raw[eocd64_start + 24..eocd64_start + 32].copy_from_slice(&u64::MAX.to_le_bytes());
    raw[eocd64_start + 32..eocd64_start + 40].copy_from_slice(&u64::MAX.to_le_bytes());

    assert!(matches!(
        ZipArchive::open(raw),
        Err(Error::CorruptArchive(_))
    ));
}

#[test]
fn entry_point_prefers_index_html_case_insensitively() {
    let archive = zipfix::build(&[
        zipfix::Entry::stored("other.htm", b"<html>wrong one</html>"),
        zipfix::Entry::stored("foo/Index.HTML", b"<html>the deck</html>"),
    ]);

    let archive = ZipArchive::open(archive).unwrap();
    let resolver = Resolver::new(PlaybackGate::new());
    let session = resolver.resolve(&archive, "Deck").unwrap();

    assert_eq!(session.document().html_text, "<html>the deck</html>");
}

#[test]
fn archive_without_html_fails_resolution() {
    let archive = zipfix::build(&[
        zipfix::Entry::stored("logo.png", &[1, 2, 3]),
        zipfix::Entry::stored("style.css", b"body {}"),
    ]);

    let archive = ZipArchive::open(archive).unwrap();
    let gate = PlaybackGate::new();
    let resolver = Resolver::new(gate.clone());

    let err = resolver.resolve(&archive, "Deck").unwrap_err();
    assert!(matches!(err, Error::NoEntryPoint));

    // Failure released the playback slot; no handles leaked.
    assert!(gate.try_begin().is_ok());
}

#[test]
fn rewrite_touches_present_assets_only() {
    let html = br#"<img src="./logo.png"><img src="missing.png">"#;
    let archive = zipfix::build(&[
        zipfix::Entry::stored("index.html", html),
        zipfix::Entry::stored("logo.png", &[0x89, 0x50, 0x4E, 0x47]),
    ]);

    let archive = ZipArchive::open(archive).unwrap();
    let resolver = Resolver::new(PlaybackGate::new());
    let session = resolver.resolve(&archive, "Deck").unwrap();

    let text = &session.document().html_text;
    assert!(text.contains(r#"src="data:image/png;base64,"#));
    // Unresolvable reference left byte-for-byte unchanged.
    assert!(text.contains(r#"<img src="missing.png">"#));
}

#[test]
fn second_resolution_is_rejected_while_session_is_live() {
    let archive = zipfix::build(&[zipfix::Entry::stored("index.html", b"<html></html>")]);
    let archive = ZipArchive::open(archive).unwrap();

    let resolver = Resolver::new(PlaybackGate::new());
    let session = resolver.resolve(&archive, "Deck").unwrap();

    assert!(matches!(
        resolver.resolve(&archive, "Deck"),
        Err(Error::Busy)
    ));

    session.release();
    assert!(resolver.resolve(&archive, "Deck").is_ok());
}

#[tokio::test]
async fn dot_slash_manifest_key_downloads_and_plays() {
    let server = MockServer::start().await;
    let archive = zipfix::build(&[zipfix::Entry::stored("index.html", b"<html>ok</html>")]);

    Mock::given(method("GET"))
        .and(path("/deck.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(archive))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let library = Library::open(server.uri(), dir.path()).await.unwrap();

    // Manifests may spell the key with a leading ./ marker.
    library.download("./deck.zip", &mut |_| {}).await.unwrap();

    assert_eq!(library.status("./deck.zip").await, ItemState::Ready);
    assert_eq!(library.stored_keys().unwrap(), vec!["deck.zip".to_string()]);

    let session = library
        .play(&demo_entry("./deck.zip", "Deck"))
        .await
        .unwrap();
    assert!(session.document().html_text.contains("ok"));
}

#[tokio::test]
async fn failed_download_reverts_state_and_allows_retry() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/deck.zip"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let library = Library::open(server.uri(), dir.path()).await.unwrap();

    let err = library.download("deck.zip", &mut |_| {}).await.unwrap_err();
    assert!(matches!(err, Error::Network { .. }));
    assert_eq!(library.status("deck.zip").await, ItemState::Failed);
    // Nothing was persisted for the failed download.
    assert!(library.stored_keys().unwrap().is_empty());
}

#[tokio::test]
async fn redownload_overwrites_stored_object() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let library = Library::open(server.uri(), dir.path()).await.unwrap();

    let first = zipfix::build(&[zipfix::Entry::stored("index.html", b"<html>v1</html>")]);
    {
        let _guard = Mock::given(method("GET"))
            .and(path("/deck.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(first))
            .mount_as_scoped(&server)
            .await;
        library.download("deck.zip", &mut |_| {}).await.unwrap();
    }

    let second = zipfix::build(&[zipfix::Entry::stored("index.html", b"<html>v2</html>")]);
    Mock::given(method("GET"))
        .and(path("/deck.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(second))
        .mount(&server)
        .await;
    library.download("deck.zip", &mut |_| {}).await.unwrap();

    let session = library.play(&demo_entry("deck.zip", "Deck")).await.unwrap();
    assert!(session.document().html_text.contains("v2"));
}
