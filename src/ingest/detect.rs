// src/ingest/detect.rs
//! Schema detection between the Atom and RSS dialects.
//!
//! The root element is peeked with the pull reader first; only the dialect it
//! names gets a full structural decode. Both dialects share tag names such as
//! `title` and `link`, so decoding "A, then B" on a best-effort basis would
//! happily accept an RSS document as an empty Atom feed.

use quick_xml::de::from_str;
use quick_xml::events::Event;
use quick_xml::{Reader, Writer};
use serde::Deserialize;

use crate::ingest::timestamp::{self, FormatError};
use crate::ingest::types::{AtomEntry, Dialect, Feed, RssItem};

#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error("feed body is not valid UTF-8")]
    Encoding(#[from] std::str::Utf8Error),
    #[error("feed body is empty")]
    Empty,
    #[error("feed body is not XML: {0}")]
    NotXml(String),
    #[error("root element <{0}> matches neither Atom nor RSS")]
    UnknownRoot(String),
    #[error("malformed {dialect} document: {source}")]
    Structure {
        dialect: Dialect,
        #[source]
        source: quick_xml::de::DeError,
    },
    #[error("RSS document has no <channel>")]
    MissingChannel,
    #[error("{dialect} entry #{index}: {source}")]
    Timestamp {
        dialect: Dialect,
        index: usize,
        #[source]
        source: FormatError,
    },
}

// --- Atom (root <feed>) ---

#[derive(Debug, Deserialize)]
struct AtomDoc {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomDocEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomDocEntry {
    #[serde(default)]
    title: Option<AtomText>,
    #[serde(default)]
    content: Option<AtomText>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    #[serde(default)]
    updated: Option<String>,
    #[serde(default)]
    id: Option<String>,
}

/// Text construct; `type="html"` and friends are ignored.
#[derive(Debug, Deserialize)]
struct AtomText {
    #[serde(rename = "$text", default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href", default)]
    href: String,
    #[serde(rename = "@rel", default)]
    rel: Option<String>,
}

// --- RSS 2.0 (root <rss>) ---

#[derive(Debug, Deserialize)]
struct RssDoc {
    #[serde(default)]
    channel: Option<RssChannel>,
}

#[derive(Debug, Deserialize)]
struct RssChannel {
    #[serde(rename = "item", default)]
    items: Vec<RssDocItem>,
}

#[derive(Debug, Deserialize)]
struct RssDocItem {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    guid: Option<RssGuid>,
    #[serde(rename = "pubDate", default)]
    pub_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RssGuid {
    #[serde(rename = "$text", default)]
    value: String,
}

/// Classify a document by its root element without decoding the body.
pub fn peek_dialect(xml: &str) -> Result<Dialect, DetectionError> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let name = e.local_name();
                return match name.as_ref() {
                    b"feed" => Ok(Dialect::Atom),
                    b"rss" => Ok(Dialect::Rss),
                    other => Err(DetectionError::UnknownRoot(
                        String::from_utf8_lossy(other).into_owned(),
                    )),
                };
            }
            Ok(Event::Text(t)) => {
                if !t.iter().all(u8::is_ascii_whitespace) {
                    return Err(DetectionError::NotXml(
                        "text found before the root element".into(),
                    ));
                }
            }
            Ok(Event::Eof) => return Err(DetectionError::Empty),
            // declaration, comments, processing instructions, doctype
            Ok(_) => {}
            Err(e) => return Err(DetectionError::NotXml(e.to_string())),
        }
    }
}

/// Decode raw feed bytes into exactly one [`Feed`] variant.
pub fn decode(raw: &[u8]) -> Result<Feed, DetectionError> {
    let text = std::str::from_utf8(raw)?;
    let text = text.trim_start_matches('\u{feff}');
    if text.trim().is_empty() {
        return Err(DetectionError::Empty);
    }
    let xml = scrub_html_entities_for_xml(text);

    let dialect = peek_dialect(&xml)?;
    let xml = flatten_text_elements(&xml)?;
    match dialect {
        Dialect::Atom => decode_atom(&xml),
        Dialect::Rss => decode_rss(&xml),
    }
}

/// Elements whose value is read as plain character data.
const TEXT_ELEMENTS: &[&[u8]] = &[b"title", b"content", b"summary", b"description"];

/// Drop child elements (and everything under them) from text elements, keeping
/// the element's own character data: `<content>line1<br/>line2</content>`
/// becomes `<content>line1line2</content>`.
fn flatten_text_elements(xml: &str) -> Result<String, DetectionError> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    let mut in_text = false;
    let mut skip_depth = 0usize;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| DetectionError::NotXml(e.to_string()))?;
        if skip_depth > 0 {
            match event {
                Event::Start(_) => skip_depth += 1,
                Event::End(_) => skip_depth -= 1,
                Event::Eof => break,
                _ => {}
            }
            continue;
        }
        match &event {
            Event::Eof => break,
            Event::Start(_) if in_text => {
                skip_depth = 1;
                continue;
            }
            Event::Empty(_) if in_text => continue,
            Event::Start(e) if TEXT_ELEMENTS.contains(&e.local_name().as_ref()) => in_text = true,
            Event::End(_) if in_text => in_text = false,
            _ => {}
        }
        writer
            .write_event(event)
            .map_err(|e| DetectionError::NotXml(e.to_string()))?;
    }

    String::from_utf8(writer.into_inner()).map_err(|e| DetectionError::NotXml(e.to_string()))
}

fn decode_atom(xml: &str) -> Result<Feed, DetectionError> {
    let doc: AtomDoc = from_str(xml).map_err(|source| DetectionError::Structure {
        dialect: Dialect::Atom,
        source,
    })?;

    let mut out = Vec::with_capacity(doc.entries.len());
    for (index, e) in doc.entries.into_iter().enumerate() {
        let updated = timestamp::parse(e.updated.as_deref().unwrap_or_default()).map_err(
            |source| DetectionError::Timestamp {
                dialect: Dialect::Atom,
                index,
                source,
            },
        )?;
        out.push(AtomEntry {
            title: e.title.map(|t| t.value).unwrap_or_default(),
            content: e.content.map(|t| t.value).unwrap_or_default(),
            link: pick_alternate_link(&e.links),
            updated,
            id: e.id.unwrap_or_default().trim().to_string(),
        });
    }
    Ok(Feed::Atom(out))
}

fn decode_rss(xml: &str) -> Result<Feed, DetectionError> {
    let doc: RssDoc = from_str(xml).map_err(|source| DetectionError::Structure {
        dialect: Dialect::Rss,
        source,
    })?;
    let channel = doc.channel.ok_or(DetectionError::MissingChannel)?;

    let mut out = Vec::with_capacity(channel.items.len());
    for (index, it) in channel.items.into_iter().enumerate() {
        let pub_date = timestamp::parse(it.pub_date.as_deref().unwrap_or_default()).map_err(
            |source| DetectionError::Timestamp {
                dialect: Dialect::Rss,
                index,
                source,
            },
        )?;
        out.push(RssItem {
            title: it.title.unwrap_or_default(),
            description: it.description.unwrap_or_default(),
            link: it.link.unwrap_or_default().trim().to_string(),
            guid: it.guid.map(|g| g.value.trim().to_string()).unwrap_or_default(),
            pub_date,
        });
    }
    Ok(Feed::Rss(out))
}

/// `rel="alternate"` (or no rel at all) is the entry's canonical link.
fn pick_alternate_link(links: &[AtomLink]) -> String {
    links
        .iter()
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .or_else(|| links.first())
        .map(|l| l.href.trim().to_string())
        .unwrap_or_default()
}

/// HTML named entities are not defined in XML; rewrite the common ones to
/// numeric references so the XML decoder accepts them.
fn scrub_html_entities_for_xml(s: &str) -> String {
    const ENTITIES: &[(&str, &str)] = &[
        ("&nbsp;", "&#160;"),
        ("&ndash;", "&#8211;"),
        ("&mdash;", "&#8212;"),
        ("&lsquo;", "&#8216;"),
        ("&rsquo;", "&#8217;"),
        ("&ldquo;", "&#8220;"),
        ("&rdquo;", "&#8221;"),
        ("&hellip;", "&#8230;"),
        ("&copy;", "&#169;"),
    ];
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = s.to_string();
    for (named, numeric) in ENTITIES {
        if out.contains(named) {
            out = out.replace(named, numeric);
        }
    }
    out
}
