//! Re-emits a parsed [`Feed`] as a normalized RSS 2.0 document.

use std::borrow::Cow;
use std::fmt::Display;

use once_cell::sync::Lazy;
use patchrss_core::{is_valid_http_url, Feed, FeedItem, PatchError};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use regex::Regex;

pub const ATOM_NAMESPACE: &str = "http://www.w3.org/2005/Atom";
pub const DC_NAMESPACE: &str = "http://purl.org/dc/elements/1.1/";

const TITLE_SUFFIX: &str = " (patched)";
const GENERATOR_SUFFIX: &str = " (patched by rsspatch)";

static ADVENTAR_CALENDAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(https://adventar\.org/calendars/[0-9]+)\.rss$").expect("static regex")
});

/// Build the patched RSS 2.0 document for `feed`, fetched from `original_url`.
pub fn rewrite(original_url: &str, feed: &Feed) -> Result<String, PatchError> {
    rewrite_with_encoding(original_url, feed, "UTF-8")
}

/// Like [`rewrite`], with the XML declaration naming `encoding`.
///
/// The caller is responsible for actually serialising the returned text in
/// that encoding.
pub fn rewrite_with_encoding(
    original_url: &str,
    feed: &Feed,
    encoding: &str,
) -> Result<String, PatchError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some(encoding), None)))
        .map_err(emit_error)?;

    let mut rss = BytesStart::new("rss");
    rss.push_attribute(("version", "2.0"));
    rss.push_attribute(("xmlns:atom", ATOM_NAMESPACE));
    if feed.uses_dublin_core() {
        rss.push_attribute(("xmlns:dc", DC_NAMESPACE));
    }
    writer.write_event(Event::Start(rss)).map_err(emit_error)?;
    writer
        .write_event(Event::Start(BytesStart::new("channel")))
        .map_err(emit_error)?;

    let title = feed.title.as_ref().map(|t| format!("{}{}", t, TITLE_SUFFIX));
    write_text(&mut writer, "title", title.as_deref())?;
    write_text(&mut writer, "link", Some(channel_link(original_url, feed).as_str()))?;
    write_text(&mut writer, "description", feed.description.as_deref())?;
    write_text(&mut writer, "lastBuildDate", feed.last_build_date.as_deref())?;
    let generator = feed
        .generator
        .as_ref()
        .map(|g| format!("{}{}", g, GENERATOR_SUFFIX));
    write_text(&mut writer, "generator", generator.as_deref())?;

    for item in &feed.items {
        write_item(&mut writer, item)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("channel")))
        .map_err(emit_error)?;
    writer
        .write_event(Event::End(BytesEnd::new("rss")))
        .map_err(emit_error)?;

    String::from_utf8(writer.into_inner()).map_err(emit_error)
}

/// The upstream's channel link if it is a usable URL, otherwise one derived
/// from where the feed was fetched.
pub fn channel_link(original_url: &str, feed: &Feed) -> String {
    match feed.link.as_deref() {
        Some(link) if is_valid_http_url(link) => link.to_string(),
        _ => derive_link(original_url),
    }
}

/// Map a feed URL to its human-facing page where the mapping is known.
///
/// Adventar calendar feeds (`.../calendars/<id>.rss`) map to the calendar
/// page; every other URL is returned unchanged.
pub fn derive_link(original_url: &str) -> String {
    match ADVENTAR_CALENDAR.captures(original_url) {
        Some(caps) => caps[1].to_string(),
        None => original_url.to_string(),
    }
}

/// `"true"` iff the guid is itself a dereferenceable http(s) URL.
pub fn is_permalink(guid: &str) -> &'static str {
    if is_valid_http_url(guid) {
        "true"
    } else {
        "false"
    }
}

fn write_item<W: std::io::Write>(writer: &mut Writer<W>, item: &FeedItem) -> Result<(), PatchError> {
    writer
        .write_event(Event::Start(BytesStart::new("item")))
        .map_err(emit_error)?;

    write_text(writer, "title", item.title.as_deref())?;
    write_text(writer, "link", item.link.as_deref())?;
    write_text(writer, "pubDate", item.pub_date.as_deref())?;
    write_text(writer, "description", item.description.as_deref())?;

    if let Some(guid) = non_empty(item.guid.as_deref()) {
        let mut start = BytesStart::new("guid");
        start.push_attribute(("isPermaLink", is_permalink(guid)));
        write_element(writer, start, "guid", guid)?;
    }

    write_text(writer, "dc:creator", item.dc_creator.as_deref())?;

    writer
        .write_event(Event::End(BytesEnd::new("item")))
        .map_err(emit_error)
}

/// Write `<name>value</name>`, or nothing when the value is absent or empty.
fn write_text<W: std::io::Write>(
    writer: &mut Writer<W>,
    name: &str,
    value: Option<&str>,
) -> Result<(), PatchError> {
    match non_empty(value) {
        Some(text) => write_element(writer, BytesStart::new(name), name, text),
        None => Ok(()),
    }
}

fn write_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    start: BytesStart<'_>,
    name: &str,
    text: &str,
) -> Result<(), PatchError> {
    writer.write_event(Event::Start(start)).map_err(emit_error)?;
    writer
        .write_event(Event::Text(BytesText::new(&xml_safe(text))))
        .map_err(emit_error)?;
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(emit_error)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Drop characters XML 1.0 cannot represent at all, escaped or not.
fn xml_safe(text: &str) -> Cow<'_, str> {
    fn allowed(c: char) -> bool {
        matches!(c, '\t' | '\n' | '\r')
            || ('\u{20}'..='\u{D7FF}').contains(&c)
            || ('\u{E000}'..='\u{FFFD}').contains(&c)
            || c >= '\u{10000}'
    }
    if text.chars().all(allowed) {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(text.chars().filter(|&c| allowed(c)).collect())
    }
}

fn emit_error<E: Display>(e: E) -> PatchError {
    PatchError::Internal(format!("failed to emit RSS: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str) -> FeedItem {
        FeedItem {
            title: Some(title.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_derive_link_for_adventar() {
        assert_eq!(
            derive_link("https://adventar.org/calendars/12345.rss"),
            "https://adventar.org/calendars/12345"
        );
    }

    #[test]
    fn test_derive_link_falls_back_to_original() {
        for url in [
            "https://example.com/feed.rss",
            "http://adventar.org/calendars/12345.rss",
            "https://adventar.org/calendars/abc.rss",
            "https://adventar.org/calendars/12345.rss?x=1",
        ] {
            assert_eq!(derive_link(url), url);
        }
    }

    #[test]
    fn test_channel_link_prefers_valid_upstream_link() {
        let feed = Feed {
            link: Some("https://blog.example.com/".into()),
            ..Default::default()
        };
        assert_eq!(
            channel_link("https://adventar.org/calendars/1.rss", &feed),
            "https://blog.example.com/"
        );
    }

    #[test]
    fn test_channel_link_replaces_invalid_or_missing() {
        let feed = Feed {
            link: Some("not-a-url".into()),
            ..Default::default()
        };
        assert_eq!(
            channel_link("https://adventar.org/calendars/12345.rss", &feed),
            "https://adventar.org/calendars/12345"
        );
        assert_eq!(
            channel_link("https://example.com/f.xml", &Feed::default()),
            "https://example.com/f.xml"
        );
    }

    #[test]
    fn test_root_namespaces() {
        let xml = rewrite("https://example.com/f", &Feed::default()).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains(r#"<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom">"#));
        assert!(!xml.contains("xmlns:dc"));

        let feed = Feed {
            items: vec![FeedItem {
                dc_creator: Some("alice".into()),
                ..Default::default()
            }],
            ..Default::default()
        };
        let xml = rewrite("https://example.com/f", &feed).unwrap();
        assert!(xml.contains(r#"xmlns:dc="http://purl.org/dc/elements/1.1/""#));
        assert!(xml.contains("<dc:creator>alice</dc:creator>"));
    }

    #[test]
    fn test_declaration_names_encoding() {
        let xml = rewrite_with_encoding("https://example.com/f", &Feed::default(), "Shift_JIS").unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"Shift_JIS\"?>"));
    }

    #[test]
    fn test_channel_suffixes_and_passthrough() {
        let feed = Feed {
            title: Some("My Feed".into()),
            link: Some("https://example.com/".into()),
            description: Some("desc".into()),
            last_build_date: Some("Tue, 02 Dec 2025 10:00:00 GMT".into()),
            generator: Some("Hugo".into()),
            items: vec![],
        };
        let xml = rewrite("https://example.com/index.xml", &feed).unwrap();
        assert!(xml.contains("<title>My Feed (patched)</title>"));
        assert!(xml.contains("<link>https://example.com/</link>"));
        assert!(xml.contains("<description>desc</description>"));
        assert!(xml.contains("<lastBuildDate>Tue, 02 Dec 2025 10:00:00 GMT</lastBuildDate>"));
        assert!(xml.contains("<generator>Hugo (patched by rsspatch)</generator>"));
    }

    #[test]
    fn test_absent_fields_are_not_emitted() {
        let feed = Feed {
            items: vec![FeedItem::default()],
            ..Default::default()
        };
        let xml = rewrite("https://example.com/f", &feed).unwrap();
        for tag in ["<title>", "<description>", "<lastBuildDate>", "<generator>", "<guid", "<pubDate>"] {
            assert!(!xml.contains(tag), "unexpected {} in {}", tag, xml);
        }
        // The channel link always has a fallback.
        assert!(xml.contains("<link>https://example.com/f</link>"));
    }

    #[test]
    fn test_guid_permalink_attribute() {
        let feed = Feed {
            items: vec![
                FeedItem {
                    guid: Some("https://example.com/p/1".into()),
                    ..Default::default()
                },
                FeedItem {
                    guid: Some("abc-123".into()),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let xml = rewrite("https://example.com/f", &feed).unwrap();
        assert!(xml.contains(r#"<guid isPermaLink="true">https://example.com/p/1</guid>"#));
        assert!(xml.contains(r#"<guid isPermaLink="false">abc-123</guid>"#));
    }

    #[test]
    fn test_item_field_order() {
        let feed = Feed {
            items: vec![FeedItem {
                title: Some("T".into()),
                link: Some("https://example.com/1".into()),
                description: Some("D".into()),
                pub_date: Some("P".into()),
                guid: Some("G".into()),
                dc_creator: Some("C".into()),
            }],
            ..Default::default()
        };
        let xml = rewrite("https://example.com/f", &feed).unwrap();
        let item = &xml[xml.find("<item>").unwrap()..];
        let positions: Vec<usize> = [
            "<title>T",
            "<link>https://example.com/1",
            "<pubDate>P",
            "<description>D",
            "<guid",
            "<dc:creator>C",
        ]
        .iter()
        .map(|needle| item.find(needle).expect(needle))
        .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{:?}", positions);
    }

    #[test]
    fn test_items_keep_source_order() {
        let feed = Feed {
            items: vec![item("c"), item("a"), item("b")],
            ..Default::default()
        };
        let xml = rewrite("https://example.com/f", &feed).unwrap();
        let a = xml.find("<title>a</title>").unwrap();
        let b = xml.find("<title>b</title>").unwrap();
        let c = xml.find("<title>c</title>").unwrap();
        assert!(c < a && a < b);
    }

    #[test]
    fn test_text_is_escaped() {
        let feed = Feed {
            title: Some("Tom & Jerry <3".into()),
            items: vec![item("a < b")],
            ..Default::default()
        };
        let xml = rewrite("https://example.com/f?a=1&b=2", &feed).unwrap();
        assert!(xml.contains("<title>Tom &amp; Jerry &lt;3 (patched)</title>"));
        assert!(xml.contains("<title>a &lt; b</title>"));
        assert!(xml.contains("<link>https://example.com/f?a=1&amp;b=2</link>"));
    }

    #[test]
    fn test_invalid_xml_chars_are_dropped() {
        let feed = Feed {
            items: vec![item("bell\u{7}tab\tok")],
            ..Default::default()
        };
        let xml = rewrite("https://example.com/f", &feed).unwrap();
        assert!(xml.contains("<title>belltab\tok</title>"));
    }
}
