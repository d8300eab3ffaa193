// src/ingest/config.rs
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_FEEDS_FILE: &str = "FEEDFLUX_FEEDS_FILE";

/// Load a feed list from an explicit path. The extension picks the format:
/// `.toml` holds `feeds = [..]`, `.json` a bare array of URLs.
pub fn load_feeds_from(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading feed list from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_feeds(&content, ext.as_str())
        .with_context(|| format!("parsing feed list {}", path.display()))
}

/// Load the feed list using env var + fallbacks:
/// 1) $FEEDFLUX_FEEDS_FILE
/// 2) config/feeds.toml
/// 3) config/feeds.json
pub fn load_feeds_default() -> Result<Vec<String>> {
    if let Ok(p) = std::env::var(ENV_FEEDS_FILE) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_feeds_from(&pb);
        } else {
            return Err(anyhow!("{ENV_FEEDS_FILE} points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from("config/feeds.toml");
    if toml_p.exists() {
        return load_feeds_from(&toml_p);
    }
    let json_p = PathBuf::from("config/feeds.json");
    if json_p.exists() {
        return load_feeds_from(&json_p);
    }
    Ok(Vec::new())
}

/// Concatenate lists, then trim, drop empties and duplicates. First
/// occurrence wins, so the result keeps polling order.
pub fn merge_feeds<I>(lists: I) -> Vec<String>
where
    I: IntoIterator<Item = Vec<String>>,
{
    clean_list(lists.into_iter().flatten())
}

fn parse_feeds(s: &str, ext: &str) -> Result<Vec<String>> {
    match ext {
        "toml" => parse_toml(s),
        "json" => parse_json(s),
        other => Err(anyhow!(
            "unsupported feed list extension {other:?} (expected .toml or .json)"
        )),
    }
}

fn parse_toml(s: &str) -> Result<Vec<String>> {
    #[derive(serde::Deserialize)]
    struct TomlFeeds {
        feeds: Vec<String>,
    }
    let v: TomlFeeds = toml::from_str(s)?;
    Ok(clean_list(v.feeds))
}

fn parse_json(s: &str) -> Result<Vec<String>> {
    let v: Vec<String> = serde_json::from_str(s)?;
    Ok(clean_list(v))
}

fn clean_list<I: IntoIterator<Item = String>>(items: I) -> Vec<String> {
    use std::collections::HashSet;
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for it in items {
        let t = it.trim();
        if !t.is_empty() && seen.insert(t.to_string()) {
            out.push(t.to_string());
        }
    }
    out
}
