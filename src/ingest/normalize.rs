// src/ingest/normalize.rs
use std::borrow::Cow;

use crate::ingest::types::{AtomEntry, CanonicalEvent, Feed, RssItem};

/// Marker that stands in for a literal newline once text becomes a flat value.
pub const LINE_BREAK: &str = "<br>";

/// Escape `& < > " '`. Quotes use the decimal forms `&#34;` and `&#39;`, which
/// are the tag values already stored for existing points.
pub fn escape_html(s: &str) -> Cow<'_, str> {
    match html_escape::encode_quoted_attribute(s) {
        Cow::Owned(escaped) if escaped.contains("&quot;") || escaped.contains("&#x27;") => {
            Cow::Owned(escaped.replace("&quot;", "&#34;").replace("&#x27;", "&#39;"))
        }
        other => other,
    }
}

/// Escape, then fold every newline into [`LINE_BREAK`].
pub fn escape_multiline(s: &str) -> String {
    escape_html(s).replace('\n', LINE_BREAK)
}

/// Map a decoded feed into canonical events for `source`.
///
/// - Atom: title, id and content are escaped and content newlines are folded.
///   The url stays empty; the escaped entry id carries identity.
/// - RSS: title and description pass through as-is, the guid becomes the url
///   and the id stays empty.
pub fn normalize(feed: Feed, source: &str) -> Vec<CanonicalEvent> {
    match feed {
        Feed::Atom(entries) => entries.into_iter().map(|e| from_atom(e, source)).collect(),
        Feed::Rss(items) => items.into_iter().map(|it| from_rss(it, source)).collect(),
    }
}

fn from_atom(e: AtomEntry, source: &str) -> CanonicalEvent {
    CanonicalEvent {
        title: escape_html(&e.title).into_owned(),
        text: escape_multiline(&e.content),
        url: String::new(),
        id: escape_html(&e.id).into_owned(),
        timestamp: e.updated,
        measurement: source.to_string(),
    }
}

fn from_rss(it: RssItem, source: &str) -> CanonicalEvent {
    CanonicalEvent {
        title: it.title,
        text: it.description,
        url: it.guid,
        id: String::new(),
        timestamp: it.pub_date,
        measurement: source.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn atom(title: &str, content: &str, id: &str) -> AtomEntry {
        AtomEntry {
            title: title.into(),
            content: content.into(),
            link: "https://e.test/a".into(),
            updated: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            id: id.into(),
        }
    }

    #[test]
    fn atom_title_is_escaped() {
        let out = normalize(Feed::Atom(vec![atom("<script>", "", "1")]), "src");
        assert_eq!(out[0].title, "&lt;script&gt;");
        assert!(!out[0].title.contains('<'));
    }

    #[test]
    fn quotes_use_decimal_entities() {
        assert_eq!(escape_html(r#"Don't "quote""#), "Don&#39;t &#34;quote&#34;");
        assert_eq!(escape_html("&quot;"), "&amp;quot;");
        assert!(matches!(escape_html("plain"), Cow::Borrowed("plain")));
    }

    #[test]
    fn atom_newlines_fold_after_escape() {
        let out = normalize(Feed::Atom(vec![atom("t", "a < b\nc", "1")]), "src");
        assert_eq!(out[0].text, "a &lt; b<br>c");
    }

    #[test]
    fn atom_url_empty_id_escaped() {
        let out = normalize(Feed::Atom(vec![atom("t", "", "tag:x&y")]), "src");
        assert_eq!(out[0].url, "");
        assert_eq!(out[0].id, "tag:x&amp;y");
        assert_eq!(out[0].measurement, "src");
    }

    #[test]
    fn rss_passes_through() {
        let item = RssItem {
            title: "<b>Bold</b>".into(),
            description: "line1\nline2".into(),
            link: "https://e.test/l".into(),
            guid: "guid-1".into(),
            pub_date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        };
        let out = normalize(Feed::Rss(vec![item]), "src");
        assert_eq!(out[0].title, "<b>Bold</b>");
        assert_eq!(out[0].text, "line1\nline2");
        assert_eq!(out[0].url, "guid-1");
        assert_eq!(out[0].id, "");
    }
}
