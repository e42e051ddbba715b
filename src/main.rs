//! Command-line interface to the offline presentation library.

use std::io::Write;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use slidecache::{CatalogEntry, Cli, Command, ItemState, Library};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let library = Library::open(cli.base_url.clone(), cli.store_dir.clone())
        .await
        .context("failed to open local store")?;

    match &cli.command {
        Command::List => list(&library).await,
        Command::Fetch { key } => fetch(&library, key, cli.quiet).await,
        Command::Remove { key } => remove(&library, key).await,
        Command::Export { key, output } => export(&library, key, output).await,
    }
}

/// Print the remote catalog with per-item local status.
async fn list(library: &Library) -> Result<()> {
    let entries = library
        .catalog()
        .await
        .context("failed to fetch the catalog")?;

    for entry in &entries {
        let status = match library.status(&entry.key).await {
            ItemState::Remote => "remote",
            ItemState::Downloading => "downloading",
            ItemState::Ready => "ready",
            ItemState::Failed => "failed",
        };
        println!(
            "{:<12}  {:<30}  {:>10}  {}",
            status, entry.title, entry.size_label, entry.key
        );
    }

    Ok(())
}

/// Download one archive, drawing a single updating progress line.
async fn fetch(library: &Library, key: &str, quiet: bool) -> Result<()> {
    let mut on_percent = |pct: u8| {
        if !quiet {
            eprint!("\r  downloading {key}: {pct:>3}%");
            let _ = std::io::stderr().flush();
        }
    };

    library
        .download(key, &mut on_percent)
        .await
        .with_context(|| format!("download of {key} failed"))?;

    if !quiet {
        eprintln!();
    }
    println!("stored: {key}");
    Ok(())
}

async fn remove(library: &Library, key: &str) -> Result<()> {
    library.remove(key).await?;
    println!("removed: {key}");
    Ok(())
}

/// Resolve a stored archive into a self-contained document and write it out.
///
/// Works entirely from local data; the catalog is not consulted, so the
/// title falls back to the key the same way the manifest defaults do.
async fn export(library: &Library, key: &str, output: &std::path::Path) -> Result<()> {
    let entry = CatalogEntry {
        id: key.to_string(),
        key: key.to_string(),
        title: key.to_string(),
        size_label: "Unknown".to_string(),
        thumbnail: None,
    };

    let session = library
        .play(&entry)
        .await
        .with_context(|| format!("failed to resolve {key}"))?;

    tokio::fs::write(output, session.document().html_text.as_bytes())
        .await
        .with_context(|| format!("failed to write {}", output.display()))?;

    println!(
        "exported {key} -> {} ({} embedded assets)",
        output.display(),
        session.handles().len()
    );
    session.release();
    Ok(())
}
