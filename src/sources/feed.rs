//! RSS/Atom adapter with JSON-feed fallback parsing.

use anyhow::Result;
use feed_rs::parser;
use reqwest::header;
use serde::Deserialize;
use std::io::{Cursor, Read};
use tracing::debug;

use super::client;
use super::types::{RawItem, Source, MAX_ITEMS_PER_SOURCE};
use super::util::{parse_date_millis, strip_html};
use crate::TARGET_WEB_REQUEST;

/// JSON feed structure for parsing
#[derive(Debug, Deserialize)]
struct JsonFeed {
    #[serde(default)]
    items: Vec<JsonFeedItem>,
}

/// JSON feed item structure
#[derive(Debug, Deserialize)]
struct JsonFeedItem {
    id: Option<String>,
    url: Option<String>,
    title: Option<String>,
    content_text: Option<String>,
    content_html: Option<String>,
    date_published: Option<String>,
}

pub async fn fetch(client: &reqwest::Client, source: &Source) -> Result<Vec<RawItem>> {
    let response = client::get(client, &source.url).await?;

    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|ct| ct.to_str().ok())
        .map(|s| s.to_lowercase());
    let content_encoding = response
        .headers()
        .get(header::CONTENT_ENCODING)
        .and_then(|value| value.to_str().ok())
        .map(|s| s.to_lowercase());

    let bytes = response.bytes().await?;

    // Some feed servers mislabel their compression; try the obvious
    // decodings before giving up on the raw bytes.
    let decompressed = if content_encoding.as_deref() == Some("br") {
        let mut decoded = Vec::new();
        let mut reader = brotli::Decompressor::new(&bytes[..], 4096);
        if reader.read_to_end(&mut decoded).is_ok() && !decoded.is_empty() {
            decoded
        } else {
            try_decompressions(&bytes)
        }
    } else {
        try_decompressions(&bytes)
    };

    let body = String::from_utf8(decompressed)
        .map_err(|_| anyhow::anyhow!("Feed from {} is not valid UTF-8", source.url))?;

    let is_json = content_type.as_deref().map(|ct| ct.contains("json")).unwrap_or(false)
        || body.trim_start().starts_with('{');

    let items = if is_json {
        parse_json_feed(&body, source)?
    } else {
        parse_xml_feed(&body, source)?
    };

    debug!(target: TARGET_WEB_REQUEST, "Feed {} produced {} items", source.id, items.len());
    Ok(items)
}

fn parse_json_feed(body: &str, source: &Source) -> Result<Vec<RawItem>> {
    let feed: JsonFeed = serde_json::from_str(body)
        .map_err(|err| anyhow::anyhow!("Failed to parse JSON feed from {}: {}", source.url, err))?;

    let mut items = Vec::new();
    for item in feed.items {
        let Some(link) = item.url.or(item.id) else {
            continue;
        };
        let content = item
            .content_text
            .or(item.content_html)
            .map(|c| strip_html(&c))
            .filter(|c| !c.is_empty());

        items.push(RawItem {
            source_id: source.id.clone(),
            title: normalize_title(item.title.as_deref()),
            link,
            comments_url: None,
            content,
            published_at: item.date_published.as_deref().and_then(parse_date_millis),
        });
        if items.len() >= MAX_ITEMS_PER_SOURCE {
            break;
        }
    }
    Ok(items)
}

fn parse_xml_feed(body: &str, source: &Source) -> Result<Vec<RawItem>> {
    let feed = match parser::parse(Cursor::new(body)) {
        Ok(feed) => feed,
        Err(first_err) => {
            // Some feeds ship malformed XML; retry after cleanup.
            let cleaned = cleanup_xml(body);
            parser::parse(Cursor::new(cleaned.as_bytes())).map_err(|second_err| {
                anyhow::anyhow!(
                    "Failed to parse feed from {}. First error: {}. Second error: {}",
                    source.url,
                    first_err,
                    second_err
                )
            })?
        }
    };

    let mut items = Vec::new();
    for entry in feed.entries {
        let Some(link) = entry.links.first().map(|link| link.href.clone()) else {
            continue;
        };
        let content = entry
            .summary
            .map(|t| t.content)
            .or_else(|| entry.content.and_then(|c| c.body))
            .map(|c| strip_html(&c))
            .filter(|c| !c.is_empty());

        items.push(RawItem {
            source_id: source.id.clone(),
            title: normalize_title(entry.title.map(|t| t.content).as_deref()),
            link,
            comments_url: None,
            content,
            published_at: entry
                .published
                .or(entry.updated)
                .map(|d| d.timestamp_millis()),
        });
        if items.len() >= MAX_ITEMS_PER_SOURCE {
            break;
        }
    }
    Ok(items)
}

fn normalize_title(title: Option<&str>) -> String {
    match title.map(strip_html).filter(|t| !t.is_empty()) {
        Some(t) => t,
        None => "Untitled".to_string(),
    }
}

/// Clean up malformed XML
fn cleanup_xml(xml: &str) -> String {
    let mut cleaned = xml.trim().to_string();

    // Remove any UTF-8 BOM if present
    if cleaned.starts_with('\u{FEFF}') {
        cleaned = cleaned[3..].to_string();
    }

    // Remove any leading garbage before the document start
    if let Some(xml_start) = cleaned.find("<?xml") {
        cleaned = cleaned[xml_start..].to_string();
    } else if let Some(rss_start) = cleaned.find("<rss") {
        cleaned = cleaned[rss_start..].to_string();
    } else if let Some(feed_start) = cleaned.find("<feed") {
        cleaned = cleaned[feed_start..].to_string();
    }

    // Replace common problematic entities
    cleaned = cleaned
        .replace("&nbsp;", "&#160;")
        .replace("&ndash;", "&#8211;")
        .replace("&mdash;", "&#8212;")
        .replace("&rsquo;", "&#8217;")
        .replace("&lsquo;", "&#8216;")
        .replace("&rdquo;", "&#8221;")
        .replace("&ldquo;", "&#8220;")
        .replace("&amp;amp;", "&amp;")
        .replace("&apos;", "&#39;");

    // Remove any invalid XML characters
    cleaned = cleaned
        .chars()
        .filter(|&c| {
            matches!(c,
                '\u{0009}' |
                '\u{000A}' |
                '\u{000D}' |
                '\u{0020}'..='\u{D7FF}' |
                '\u{E000}'..='\u{FFFD}' |
                '\u{10000}'..='\u{10FFFF}'
            )
        })
        .collect();

    if !cleaned.starts_with("<?xml") {
        cleaned = format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}", cleaned);
    }

    cleaned
}

/// Try various decompression methods for a byte array
fn try_decompressions(bytes: &[u8]) -> Vec<u8> {
    let mut decoder = flate2::read::GzDecoder::new(bytes);
    let mut decoded = Vec::new();
    if decoder.read_to_end(&mut decoded).is_ok() && !decoded.is_empty() {
        return decoded;
    }

    let mut decoder = flate2::read::ZlibDecoder::new(bytes);
    let mut decoded = Vec::new();
    if decoder.read_to_end(&mut decoded).is_ok() && !decoded.is_empty() {
        return decoded;
    }

    let mut decoder = flate2::read::DeflateDecoder::new(bytes);
    let mut decoded = Vec::new();
    if decoder.read_to_end(&mut decoded).is_ok() && !decoded.is_empty() {
        return decoded;
    }

    bytes.to_vec()
}
