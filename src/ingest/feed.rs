// src/ingest/feed.rs
//! Syndication feed parsing (RSS 2.0, RSS 1.0/RDF, Atom) into [`RawEntry`]s.
//!
//! Only direct children of an `<item>`/`<entry>` are read, so nested elements
//! such as `<media:group><media:title>` never overwrite the entry title.

use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::OffsetDateTime;

use crate::ingest::normalize_text;
use crate::ingest::types::RawEntry;

/// Per-document cap on parsed entries.
pub const MAX_ENTRIES_PER_FEED: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum FeedParseError {
    #[error("malformed xml at byte {position}: {message}")]
    Xml { position: u64, message: String },
    #[error("not an RSS or Atom document (root element <{0}>)")]
    NotAFeed(String),
    #[error("empty document")]
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Link,
    Description,
    Published,
}

fn field_for(local: &str) -> Option<Field> {
    match local {
        "title" => Some(Field::Title),
        "link" => Some(Field::Link),
        "description" | "summary" => Some(Field::Description),
        "pubDate" | "published" | "updated" | "date" => Some(Field::Published),
        _ => None,
    }
}

#[derive(Debug, Default)]
struct Draft {
    title: String,
    link: String,
    description: String,
    published: String,
    /// Open elements below the entry element.
    depth: usize,
    field: Option<Field>,
}

impl Draft {
    fn push_text(&mut self, text: &str) {
        let target = match self.field {
            Some(Field::Title) => &mut self.title,
            Some(Field::Link) => &mut self.link,
            Some(Field::Description) => &mut self.description,
            // First date wins; Atom `updated` after `published` is ignored.
            Some(Field::Published) if self.published.is_empty() => &mut self.published,
            _ => return,
        };
        target.push_str(text);
    }

    fn has_link(&self) -> bool {
        !self.link.trim().is_empty()
    }

    /// Atom `<link href=".." rel="alternate"/>`.
    fn take_link_attr(&mut self, e: &BytesStart<'_>) {
        if self.has_link() {
            return;
        }
        let rel = attr(e, "rel");
        if rel.as_deref().is_some_and(|r| r != "alternate") {
            return;
        }
        if let Some(href) = attr(e, "href") {
            self.link = href;
        }
    }

    fn finish(self) -> RawEntry {
        RawEntry {
            title: normalize_text(&self.title),
            link: self.link.trim().to_string(),
            description: normalize_text(&self.description),
            published: parse_published(&self.published),
        }
    }
}

fn local_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

fn attr(e: &BytesStart<'_>, name: &str) -> Option<String> {
    e.try_get_attribute(name)
        .ok()
        .flatten()
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// Parse RFC 2822 (RSS) or RFC 3339 (Atom, Dublin Core) timestamps.
/// Unparseable or empty input yields `None`.
pub fn parse_published(ts: &str) -> Option<DateTime<Utc>> {
    let ts = ts.trim();
    if ts.is_empty() {
        return None;
    }
    if let Ok(dt) =
        OffsetDateTime::parse(ts, &Rfc2822).or_else(|_| OffsetDateTime::parse(ts, &Rfc3339))
    {
        return DateTime::from_timestamp(dt.unix_timestamp(), dt.nanosecond());
    }
    // obsolete zone names such as "GMT"
    if let Ok(dt) = DateTime::parse_from_rfc2822(ts) {
        return Some(dt.with_timezone(&Utc));
    }
    tracing::debug!(value = ts, "unparseable publish date, treating as absent");
    None
}

/// Parse one feed document, keeping at most [`MAX_ENTRIES_PER_FEED`] entries.
pub fn parse_feed(xml: &str) -> Result<Vec<RawEntry>, FeedParseError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut root: Option<String> = None;
    let mut entries = Vec::new();
    let mut draft: Option<Draft> = None;

    loop {
        let event = match reader.read_event() {
            Ok(ev) => ev,
            Err(e) => {
                return Err(FeedParseError::Xml {
                    position: reader.buffer_position() as u64,
                    message: e.to_string(),
                })
            }
        };
        match event {
            Event::Start(e) => {
                let name = local_name(e.local_name().as_ref());
                if root.is_none() {
                    if !matches!(name.as_str(), "rss" | "feed" | "RDF") {
                        return Err(FeedParseError::NotAFeed(name));
                    }
                    root = Some(name);
                    continue;
                }
                if let Some(d) = draft.as_mut() {
                    d.depth += 1;
                    d.field = if d.depth == 1 { field_for(&name) } else { None };
                    if d.field == Some(Field::Link) {
                        d.take_link_attr(&e);
                        // first link value wins; later ones are not appended to it
                        if d.has_link() {
                            d.field = None;
                        }
                    }
                } else if name == "item" || name == "entry" {
                    draft = Some(Draft::default());
                }
            }
            Event::Empty(e) => {
                if root.is_none() {
                    return Err(FeedParseError::NotAFeed(local_name(
                        e.local_name().as_ref(),
                    )));
                }
                if let Some(d) = draft.as_mut() {
                    if d.depth == 0 && e.local_name().as_ref() == b"link" {
                        d.take_link_attr(&e);
                    }
                }
            }
            Event::End(_) => {
                let Some(d) = draft.as_mut() else { continue };
                if d.depth > 0 {
                    d.depth -= 1;
                    d.field = None;
                    continue;
                }
                if let Some(done) = draft.take() {
                    entries.push(done.finish());
                }
                if entries.len() >= MAX_ENTRIES_PER_FEED {
                    break;
                }
            }
            Event::Text(t) => {
                if let Some(d) = draft.as_mut() {
                    // HTML entities that XML does not define are left for normalize_text
                    let text = t
                        .unescape()
                        .map(|c| c.into_owned())
                        .unwrap_or_else(|_| String::from_utf8_lossy(&t).into_owned());
                    d.push_text(&text);
                }
            }
            Event::CData(c) => {
                if let Some(d) = draft.as_mut() {
                    d.push_text(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if root.is_none() {
        return Err(FeedParseError::Empty);
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <title>Интерфакс</title>
    <link>https://www.interfax.ru/</link>
    <item>
      <title>ЦБ сохранил ключевую ставку</title>
      <link>https://www.interfax.ru/business/1001</link>
      <description><![CDATA[<p>Совет директоров &laquo;Банка России&raquo;</p>]]></description>
      <pubDate>Fri, 14 Mar 2025 10:30:00 +0300</pubDate>
      <media:group><media:title>thumbnail</media:title></media:group>
    </item>
    <item>
      <title>Без даты</title>
      <link>https://www.interfax.ru/business/1002</link>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn rss_items_are_parsed() {
        let entries = parse_feed(RSS).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].title, "ЦБ сохранил ключевую ставку");
        assert_eq!(entries[0].link, "https://www.interfax.ru/business/1001");
        assert_eq!(entries[0].description, "Совет директоров «Банка России»");
        assert_eq!(
            entries[0].published,
            Some(Utc.with_ymd_and_hms(2025, 3, 14, 7, 30, 0).unwrap())
        );
        assert_eq!(entries[1].published, None);
    }

    #[test]
    fn atom_entries_use_alternate_link() {
        let atom = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>MOEX</title>
  <entry>
    <title type="html">Торги &amp; итоги</title>
    <link rel="self" href="https://moex.test/self/1"/>
    <link rel="alternate" href="https://moex.test/n/1"/>
    <published>2025-03-14T07:00:00Z</published>
    <updated>2025-03-14T08:00:00Z</updated>
    <summary>Итоги торгов</summary>
  </entry>
</feed>"#;
        let entries = parse_feed(atom).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Торги & итоги");
        assert_eq!(entries[0].link, "https://moex.test/n/1");
        assert_eq!(entries[0].description, "Итоги торгов");
        assert_eq!(
            entries[0].published,
            Some(Utc.with_ymd_and_hms(2025, 3, 14, 7, 0, 0).unwrap())
        );
    }

    #[test]
    fn first_link_value_wins() {
        let xml = r#"<rss xmlns:atom="http://www.w3.org/2005/Atom"><channel>
  <item>
    <title>t</title>
    <atom:link href="https://a.test/x"/>
    <link>https://b.test/y</link>
  </item>
  <item>
    <title>u</title>
    <link>https://a.test/1</link>
    <link>https://a.test/2</link>
  </item>
  <item>
    <title>v</title>
    <link href="https://a.test/attr">https://a.test/text</link>
  </item>
</channel></rss>"#;
        let entries = parse_feed(xml).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].link, "https://a.test/x");
        assert_eq!(entries[1].link, "https://a.test/1");
        assert_eq!(entries[2].link, "https://a.test/attr");
    }

    #[test]
    fn at_most_ten_entries_are_kept() {
        let mut xml = String::from("<rss><channel>");
        for i in 0..15 {
            xml.push_str(&format!(
                "<item><title>t{i}</title><link>https://x.test/{i}</link></item>"
            ));
        }
        xml.push_str("</channel></rss>");
        let entries = parse_feed(&xml).unwrap();
        assert_eq!(entries.len(), MAX_ENTRIES_PER_FEED);
        assert_eq!(entries[9].title, "t9");
    }

    #[test]
    fn html_page_is_not_a_feed() {
        let err = parse_feed("<html><body>blocked</body></html>").unwrap_err();
        assert!(matches!(err, FeedParseError::NotAFeed(ref n) if n == "html"));
    }

    #[test]
    fn broken_xml_and_empty_input_are_errors() {
        assert!(matches!(
            parse_feed("<rss><channel><item></channel></rss>"),
            Err(FeedParseError::Xml { .. })
        ));
        assert!(matches!(parse_feed("   "), Err(FeedParseError::Empty)));
    }

    #[test]
    fn bad_dates_are_treated_as_absent() {
        assert_eq!(parse_published("вчера"), None);
        assert_eq!(parse_published(""), None);
        assert!(parse_published("Fri, 14 Mar 2025 10:30:00 GMT").is_some());
    }
}
