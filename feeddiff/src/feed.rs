//! XML-level inspection of feed bodies: the channel `pubDate`, the declared
//! encoding and the number of entries.

use std::collections::HashMap;

use anyhow::{Context, Result};
use quick_xml::events::Event;
use quick_xml::name::ResolveResult;
use quick_xml::reader::{NsReader, Reader};
use tracing::{debug, warn};

/// Extracts the text of the first `pubDate` element that is a direct child of a
/// `channel` element below the document element.
///
/// Only names in no namespace match: `<rss xmlns="...">` or `<x:channel>` hide
/// the element. The text is returned verbatim (entities resolved, including those
/// declared in an internal DTD subset; no trimming). Returns `None` when the
/// element is missing, empty, or when the text is not well-formed XML; parse
/// failures are logged and never propagated.
pub fn extract_pub_date(xml: &str) -> Option<String> {
    match find_channel_pub_date(xml) {
        Ok(pub_date) => pub_date,
        Err(e) => {
            warn!(error = %format!("{:#}", e), "failed to parse feed XML");
            None
        }
    }
}

/// Text being collected for a matched `pubDate` element.
struct Capture {
    depth: usize,
    text: String,
    /// Set once a child element starts; later text is not the element's own.
    closed: bool,
}

fn find_channel_pub_date(xml: &str) -> Result<Option<String>> {
    let mut reader = NsReader::from_str(xml);
    // Local names of open elements; `None` for namespaced ones
    let mut path: Vec<Option<Vec<u8>>> = Vec::new();
    let mut entities = predefined_entities();
    let mut seen_root = false;
    let mut capture: Option<Capture> = None;
    // Outer Option: has the first match been decided yet
    let mut found: Option<Option<String>> = None;

    loop {
        let position = reader.buffer_position();
        let (ns, event) = reader
            .read_resolved_event()
            .with_context(|| format!("malformed XML near byte {}", position))?;

        match event {
            Event::Start(e) => {
                if path.is_empty() && seen_root {
                    anyhow::bail!("content after the document element");
                }
                seen_root = true;
                if let Some(cap) = capture.as_mut() {
                    cap.closed = true;
                }

                let name = plain_name(ns, e.local_name().as_ref())?;
                if found.is_none() && capture.is_none() && is_channel_pub_date(&path, name.as_deref()) {
                    capture = Some(Capture {
                        depth: path.len() + 1,
                        text: String::new(),
                        closed: false,
                    });
                }
                path.push(name);
            }
            Event::Empty(e) => {
                if path.is_empty() && seen_root {
                    anyhow::bail!("content after the document element");
                }
                seen_root = true;
                if let Some(cap) = capture.as_mut() {
                    cap.closed = true;
                }

                let name = plain_name(ns, e.local_name().as_ref())?;
                if found.is_none() && capture.is_none() && is_channel_pub_date(&path, name.as_deref()) {
                    found = Some(None);
                }
            }
            Event::End(_) => {
                let closing_depth = path.len();
                if path.pop().is_none() {
                    anyhow::bail!("closing tag without a matching opening tag");
                }
                if capture.as_ref().map_or(false, |c| c.depth == closing_depth) {
                    if let Some(cap) = capture.take() {
                        found = Some(Some(cap.text).filter(|t| !t.is_empty()));
                    }
                }
            }
            Event::Text(t) => {
                if path.is_empty() {
                    if !t.iter().all(|b| b.is_ascii_whitespace()) {
                        anyhow::bail!("text outside the document element");
                    }
                    continue;
                }
                let text = t
                    .unescape_with(|name| entities.get(name).map(String::as_str))
                    .context("invalid character or entity reference")?;
                if let Some(cap) = capture.as_mut().filter(|c| !c.closed) {
                    cap.text.push_str(&text);
                }
            }
            Event::CData(c) => {
                if path.is_empty() {
                    anyhow::bail!("CDATA outside the document element");
                }
                let raw = c.into_inner();
                let text = std::str::from_utf8(&raw).context("CDATA section is not valid UTF-8")?;
                if let Some(cap) = capture.as_mut().filter(|c| !c.closed) {
                    cap.text.push_str(text);
                }
            }
            Event::DocType(d) => {
                let doctype = std::str::from_utf8(&d).context("DOCTYPE is not valid UTF-8")?;
                entities.extend(internal_entities(doctype));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !seen_root {
        anyhow::bail!("no document element found");
    }
    if !path.is_empty() {
        anyhow::bail!("document ends inside {} unclosed element(s)", path.len());
    }

    Ok(found.flatten())
}

/// Local name of an element in no namespace, `None` for a namespaced one.
fn plain_name(ns: ResolveResult, local: &[u8]) -> Result<Option<Vec<u8>>> {
    match ns {
        ResolveResult::Unbound => Ok(Some(local.to_vec())),
        ResolveResult::Bound(_) => Ok(None),
        ResolveResult::Unknown(prefix) => {
            anyhow::bail!("undeclared namespace prefix {}", String::from_utf8_lossy(&prefix))
        }
    }
}

/// `name` is a `pubDate` whose parent is a `channel` other than the document element.
fn is_channel_pub_date(path: &[Option<Vec<u8>>], name: Option<&[u8]>) -> bool {
    name == Some(b"pubDate".as_slice())
        && path.len() >= 2
        && path
            .last()
            .map_or(false, |parent| parent.as_deref() == Some(b"channel".as_slice()))
}

fn predefined_entities() -> HashMap<String, String> {
    [("lt", "<"), ("gt", ">"), ("amp", "&"), ("apos", "'"), ("quot", "\"")]
        .into_iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}

/// General entities declared with a literal value in a DOCTYPE internal subset.
/// Parameter entities and external entities are skipped.
fn internal_entities(doctype: &str) -> HashMap<String, String> {
    let mut entities = HashMap::new();
    let mut rest = doctype;

    while let Some(start) = rest.find("<!ENTITY") {
        rest = rest[start + "<!ENTITY".len()..].trim_start();
        if rest.starts_with('%') {
            continue;
        }
        let name_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let name = &rest[..name_end];
        rest = rest[name_end..].trim_start();

        let Some(quote) = rest.chars().next().filter(|c| *c == '"' || *c == '\'') else {
            continue;
        };
        let Some(value_len) = rest[1..].find(quote) else {
            break;
        };
        let raw = &rest[1..1 + value_len];
        let value = quick_xml::escape::unescape(raw)
            .map(|v| v.into_owned())
            .unwrap_or_else(|_| raw.to_string());
        debug!(entity = name, "internal DTD entity declared");
        entities.insert(name.to_string(), value);
        rest = &rest[1 + value_len + 1..];
    }

    entities
}

/// Returns the `encoding` declared in the XML declaration, if there is one.
pub fn declared_encoding(xml: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Decl(decl)) => {
                return decl
                    .encoding()
                    .and_then(|enc| enc.ok())
                    .map(|enc| String::from_utf8_lossy(&enc).into_owned());
            }
            // Only leading whitespace may precede the declaration
            Ok(Event::Text(t)) if t.iter().all(|b| b.is_ascii_whitespace()) => continue,
            _ => return None,
        }
    }
}

/// Number of entries when the body parses as an RSS/Atom/JSON feed.
pub fn count_items(body: &str) -> Option<usize> {
    match feed_rs::parser::parse(body.as_bytes()) {
        Ok(feed) => Some(feed.entries.len()),
        Err(e) => {
            debug!(error = %e, "body did not parse as a feed");
            None
        }
    }
}

/// Feed-level facts shown next to the raw comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedSummary {
    pub declared_encoding: Option<String>,
    pub item_count: Option<usize>,
}

impl FeedSummary {
    pub fn of(body: &str) -> Self {
        Self {
            declared_encoding: declared_encoding(body),
            item_count: count_items(body),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Local news</title>
    <pubDate>Tue, 02 Jan 2024 08:30:00 +0800</pubDate>
    <item>
      <title>First</title>
      <link>https://example.com/1</link>
      <pubDate>Mon, 01 Jan 2024 10:00:00 +0800</pubDate>
    </item>
    <item>
      <title>Second</title>
      <link>https://example.com/2</link>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn extracts_minimal_pub_date() {
        let xml = "<rss><channel><pubDate>Mon, 01 Jan 2024 00:00:00 GMT</pubDate></channel></rss>";
        assert_eq!(
            extract_pub_date(xml).as_deref(),
            Some("Mon, 01 Jan 2024 00:00:00 GMT")
        );
    }

    #[test]
    fn channel_pub_date_wins_over_item_pub_date() {
        assert_eq!(
            extract_pub_date(FEED).as_deref(),
            Some("Tue, 02 Jan 2024 08:30:00 +0800")
        );
    }

    #[test]
    fn item_pub_date_alone_is_not_a_channel_pub_date() {
        let xml = "<rss><channel><item><pubDate>Mon, 01 Jan 2024</pubDate></item></channel></rss>";
        assert_eq!(extract_pub_date(xml), None);
    }

    #[test]
    fn channel_found_at_any_depth() {
        let xml = "<wrapper><rss><channel><pubDate>today</pubDate></channel></rss></wrapper>";
        assert_eq!(extract_pub_date(xml).as_deref(), Some("today"));
    }

    #[test]
    fn root_channel_is_not_searched() {
        assert_eq!(extract_pub_date("<channel><pubDate>D</pubDate></channel>"), None);
    }

    #[test]
    fn namespaced_elements_do_not_match() {
        let default_ns = r#"<rss xmlns="http://x"><channel><pubDate>D</pubDate></channel></rss>"#;
        assert_eq!(extract_pub_date(default_ns), None);

        let prefixed = r#"<rss xmlns:a="http://x"><a:channel><a:pubDate>D</a:pubDate></a:channel></rss>"#;
        assert_eq!(extract_pub_date(prefixed), None);

        let unrelated = r#"<rss xmlns:dc="http://purl.org/dc/elements/1.1/"><channel><dc:date>x</dc:date><pubDate>D</pubDate></channel></rss>"#;
        assert_eq!(extract_pub_date(unrelated).as_deref(), Some("D"));
    }

    #[test]
    fn undeclared_prefix_yields_none() {
        assert_eq!(
            extract_pub_date("<rss><channel><a:b/><pubDate>D</pubDate></channel></rss>"),
            None
        );
    }

    #[test]
    fn internal_dtd_entities_are_expanded() {
        let xml = r#"<!DOCTYPE rss [<!ENTITY nbsp "&#160;"><!ENTITY % p "x"><!ENTITY who 'Local &amp; World'>]>
<rss><channel><pubDate>a&nbsp;b &who;</pubDate></channel></rss>"#;
        assert_eq!(extract_pub_date(xml).as_deref(), Some("a\u{a0}b Local & World"));

        let undeclared = "<rss><channel><pubDate>a&nbsp;b</pubDate></channel></rss>";
        assert_eq!(extract_pub_date(undeclared), None);
    }

    #[test]
    fn text_is_returned_verbatim() {
        let xml = "<rss><channel><pubDate>  Mon &amp; Tue \n</pubDate></channel></rss>";
        assert_eq!(extract_pub_date(xml).as_deref(), Some("  Mon & Tue \n"));

        let cdata = "<rss><channel><pubDate><![CDATA[Mon, 01 Jan]]></pubDate></channel></rss>";
        assert_eq!(extract_pub_date(cdata).as_deref(), Some("Mon, 01 Jan"));
    }

    #[test]
    fn non_xml_yields_none() {
        assert_eq!(extract_pub_date("not xml"), None);
        assert_eq!(extract_pub_date(""), None);
    }

    #[test]
    fn malformed_xml_yields_none() {
        assert_eq!(
            extract_pub_date("<rss><channel><pubDate>x</pubDate></chanel></rss>"),
            None
        );
        assert_eq!(
            extract_pub_date("<rss><channel><pubDate>x</pubDate></channel>"),
            None
        );
        assert_eq!(
            extract_pub_date("<rss><channel><pubDate>x</pubDate></channel></rss><rss/>"),
            None
        );
    }

    #[test]
    fn missing_or_empty_pub_date_yields_none() {
        assert_eq!(extract_pub_date("<rss><channel><title>t</title></channel></rss>"), None);
        assert_eq!(extract_pub_date("<rss><channel><pubDate/></channel></rss>"), None);
        assert_eq!(
            extract_pub_date("<rss><channel><pubDate></pubDate></channel></rss>"),
            None
        );
    }

    #[test]
    fn reads_declared_encoding() {
        assert_eq!(declared_encoding(FEED).as_deref(), Some("UTF-8"));
        assert_eq!(
            declared_encoding("\n<?xml version='1.0' encoding='big5'?><rss/>").as_deref(),
            Some("big5")
        );
        assert_eq!(declared_encoding("<?xml version=\"1.0\"?><rss/>"), None);
        assert_eq!(declared_encoding("<rss/>"), None);
    }

    #[test]
    fn summary_counts_items() {
        let summary = FeedSummary::of(FEED);
        assert_eq!(summary.item_count, Some(2));
        assert_eq!(summary.declared_encoding.as_deref(), Some("UTF-8"));

        assert_eq!(FeedSummary::of("not xml"), FeedSummary::default());
    }
}
