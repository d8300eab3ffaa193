// src/ingest/types.rs
use chrono::{DateTime, Utc};

/// Which of the two supported XML dialects a document uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Entry-based feed with free-text `<content>` (root `<feed>`).
    Atom,
    /// Item-based feed with a `<description>` (root `<rss>`).
    Rss,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Atom => "Atom",
            Dialect::Rss => "RSS",
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded feed. Exactly one dialect, never both.
#[derive(Debug, Clone, PartialEq)]
pub enum Feed {
    Atom(Vec<AtomEntry>),
    Rss(Vec<RssItem>),
}

impl Feed {
    pub fn dialect(&self) -> Dialect {
        match self {
            Feed::Atom(_) => Dialect::Atom,
            Feed::Rss(_) => Dialect::Rss,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Feed::Atom(v) => v.len(),
            Feed::Rss(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AtomEntry {
    pub title: String,
    /// May carry inline markup and newlines.
    pub content: String,
    pub link: String,
    pub updated: DateTime<Utc>,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RssItem {
    pub title: String,
    pub description: String,
    pub link: String,
    pub guid: String,
    pub pub_date: DateTime<Utc>,
}

/// Dialect-independent shape of one feed entry, ready for the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalEvent {
    pub title: String,
    pub text: String,
    pub url: String,
    pub id: String,
    pub timestamp: DateTime<Utc>,
    /// Originating feed URL; doubles as the measurement name.
    pub measurement: String,
}
