//! RSS 2.0 and Atom parsing into [`RawFeedItem`]s.
//!
//! Only the fields the pipeline needs are read: title, link, publish date,
//! and a content/summary field. Content is HTML-stripped into a plain-text
//! snippet; the lede is the first 400 characters of that snippet.

use crate::error::{PipelineError, Result};
use crate::models::RawFeedItem;
use crate::utils::{collapse_whitespace, take_chars};
use chrono::{DateTime, Utc};
use quick_xml::Reader;
use quick_xml::events::Event;
use scraper::Html;
use serde::Deserialize;
use tracing::debug;

/// Characters of the snippet kept as the lede.
pub const LEDE_CHARS: usize = 400;

#[derive(Debug, Deserialize)]
struct RssDocument {
    channel: RssChannel,
}

#[derive(Debug, Deserialize)]
struct RssChannel {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    #[serde(rename = "date", alias = "dc:date")]
    dc_date: Option<String>,
    description: Option<String>,
    #[serde(rename = "encoded", alias = "content:encoded")]
    content_encoded: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<AtomText>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    published: Option<String>,
    updated: Option<String>,
    summary: Option<AtomText>,
    content: Option<AtomText>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomText {
    #[serde(rename = "$text", default)]
    value: String,
}

/// Format-neutral view of one entry before cleanup.
struct Entry {
    title: String,
    link: String,
    published: Option<String>,
    content_html: Option<String>,
}

/// Strip HTML tags and collapse whitespace.
pub fn strip_html(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let text = fragment.root_element().text().collect::<Vec<_>>().join(" ");
    collapse_whitespace(&text)
}

/// Parse an RFC 3339 or RFC 2822 timestamp.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_rfc2822(raw))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

/// Local name of the document's root element, if the document has one.
fn root_element(xml: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return Some(String::from_utf8_lossy(e.local_name().as_ref()).to_lowercase());
            }
            Ok(Event::Eof) | Err(_) => return None,
            Ok(_) => {}
        }
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|v| !v.trim().is_empty())
}

fn from_rss(item: RssItem) -> Entry {
    Entry {
        title: item.title.unwrap_or_default(),
        link: item.link.unwrap_or_default(),
        published: non_empty(item.pub_date).or(non_empty(item.dc_date)),
        content_html: non_empty(item.content_encoded).or(non_empty(item.description)),
    }
}

fn from_atom(entry: AtomEntry) -> Entry {
    let link = entry
        .links
        .iter()
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .or(entry.links.first())
        .and_then(|l| l.href.clone())
        .unwrap_or_default();
    Entry {
        title: entry.title.map(|t| t.value).unwrap_or_default(),
        link,
        published: non_empty(entry.published).or(non_empty(entry.updated)),
        content_html: non_empty(entry.content.map(|c| c.value))
            .or(non_empty(entry.summary.map(|s| s.value))),
    }
}

fn into_raw(entry: Entry, fetched_at: DateTime<Utc>) -> RawFeedItem {
    let title = collapse_whitespace(&entry.title);
    let snippet = entry.content_html.as_deref().map(strip_html).unwrap_or_default();
    let (published_at, dated) = match entry.published.as_deref().and_then(parse_timestamp) {
        Some(ts) => (ts, true),
        None => {
            debug!(%title, raw = ?entry.published, "No usable publish date; using fetch time");
            (fetched_at, false)
        }
    };
    let body = if snippet.is_empty() { title.clone() } else { snippet.clone() };

    RawFeedItem {
        excerpt: take_chars(&snippet, LEDE_CHARS),
        body,
        title,
        link: entry.link.trim().to_string(),
        published_at,
        dated,
    }
}

/// Parse a feed document, newest-first order as published by the source.
///
/// # Arguments
///
/// * `xml` - RSS 2.0 or Atom document
/// * `fetched_at` - Used for entries without a parseable date
///
/// # Errors
///
/// [`PipelineError::FeedParse`] when the root element is neither `<rss>` nor
/// `<feed>`, or the document does not deserialize.
pub fn parse_feed(xml: &str, fetched_at: DateTime<Utc>) -> Result<Vec<RawFeedItem>> {
    let entries: Vec<Entry> = match root_element(xml).as_deref() {
        Some("rss") => quick_xml::de::from_str::<RssDocument>(xml)
            .map_err(|e| PipelineError::FeedParse(format!("bad RSS: {e}")))?
            .channel
            .items
            .into_iter()
            .map(from_rss)
            .collect(),
        Some("feed") => quick_xml::de::from_str::<AtomFeed>(xml)
            .map_err(|e| PipelineError::FeedParse(format!("bad Atom: {e}")))?
            .entries
            .into_iter()
            .map(from_atom)
            .collect(),
        Some(other) => {
            return Err(PipelineError::FeedParse(format!("unexpected root element <{other}>")));
        }
        None => return Err(PipelineError::FeedParse("no root element".to_string())),
    };

    Ok(entries
        .into_iter()
        .map(|e| into_raw(e, fetched_at))
        .filter(|item| !item.title.is_empty() || !item.link.is_empty())
        .collect())
}
