//! Event store operations: fetch the next event of a window, upload an event.

use crate::config::Config;
use crate::review::write_output;
use crate::session::Session;
use anyhow::Context;
use chrono::{DateTime, Utc};
use log::info;
use spk_event::{EventCursor, EventStoreClient};
use spk_utils::dates;
use std::path::Path;

/// Load the cursor kept in `path`; a missing file starts from scratch.
pub fn read_cursor(path: &Path) -> anyhow::Result<EventCursor> {
    if !path.exists() {
        return Ok(EventCursor::default());
    }
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read index file {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Invalid index file {}", path.display()))
}

pub fn write_cursor(path: &Path, cursor: &EventCursor) -> anyhow::Result<()> {
    std::fs::write(path, serde_json::to_string(cursor)?)
        .with_context(|| format!("Failed to write index file {}", path.display()))
}

fn parse_window(start: &str, end: &str) -> anyhow::Result<(DateTime<Utc>, DateTime<Utc>)> {
    let start = dates::parse_iso(start).context("Invalid --start")?;
    let end = dates::parse_iso(end).context("Invalid --end")?;
    if end < start {
        anyhow::bail!("--end {} lies before --start {}", end, start);
    }
    Ok((start, end))
}

pub async fn run_fetch(
    config: &Config,
    manifest: &Path,
    start: &str,
    end: &str,
    index_file: Option<&Path>,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let (start, end) = parse_window(start, end)?;
    let mut cursor = match index_file {
        Some(path) => read_cursor(path)?,
        None => EventCursor::default(),
    };
    let client = EventStoreClient::new(config.store.clone())?;
    let (name, xml) = client.fetch_next(&mut cursor, &start, &end).await?;
    if let Some(path) = index_file {
        write_cursor(path, &cursor)?;
    }

    let mut session = Session::from_manifest(manifest)?;
    session
        .load_event(&xml)
        .with_context(|| format!("Invalid event {}", name))?;
    info!(
        "Fetched {} ({} stations with picks)",
        name,
        session.store.iter().filter(|r| r.has_pick()).count()
    );
    write_output(&xml, output)
}

pub async fn run_upload(config: &Config, manifest: &Path, event: &Path) -> anyhow::Result<()> {
    let mut session = Session::from_manifest(manifest)?;
    session.load_event_file(event)?;
    let event_id = session.solution.event_id_or_new().to_string();
    let xml = session.to_xml()?;
    let client = EventStoreClient::new(config.store.clone())?;
    let url = client.upload_event(&event_id, xml).await?;
    info!("Uploaded event {} to {}", event_id, url);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        let mut cursor = read_cursor(&path).unwrap();
        assert_eq!(cursor, EventCursor::default());
        cursor.next(4);
        cursor.next(4);
        write_cursor(&path, &cursor).unwrap();
        let mut restored = read_cursor(&path).unwrap();
        assert_eq!(restored.next(4), Some(2));
    }

    #[test]
    fn test_window() {
        let (start, end) = parse_window("2009-12-27T10:50:00", "2009-12-27T11:00:00Z").unwrap();
        assert_eq!(dates::seconds_between(&end, &start), 600.0);
        assert!(parse_window("2009-12-27T11:00:00", "2009-12-27T10:00:00").is_err());
        assert!(parse_window("yesterday", "2009-12-27T10:00:00").is_err());
    }
}
