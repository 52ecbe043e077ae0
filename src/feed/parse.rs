// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::borrow::Cow;

use url::Url;

use crate::error::FeedError;

/// Represents a parsed podcast feed
#[derive(Debug, Clone)]
pub struct Podcast {
    /// Where the feed document was fetched from
    pub feed_url: String,
    pub title: String,
    pub description: Option<String>,
    pub image_url: Option<Url>,
    pub episodes: Vec<Episode>,
}

/// Represents a single podcast episode
#[derive(Debug, Clone)]
pub struct Episode {
    pub title: String,
    pub description: Option<String>,
    pub guid: Option<String>,
    pub image_url: Option<Url>,
    /// Attached media, in document order
    pub enclosures: Vec<Enclosure>,
}

/// A media file attached to an episode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enclosure {
    pub url: Url,
    pub length: Option<u64>,
    pub mime_type: Option<String>,
}

/// Parse RSS feed XML bytes into a Podcast struct
///
/// Feeds containing characters that are illegal in XML are retried once
/// with those characters stripped.
pub fn parse_feed(xml_bytes: &[u8], feed_url: &str) -> Result<Podcast, FeedError> {
    let channel = match rss::Channel::read_from(xml_bytes) {
        Ok(channel) => channel,
        Err(first_error) => {
            let lossy = String::from_utf8_lossy(xml_bytes);
            let cleaned = strip_invalid_xml_chars(&lossy);
            rss::Channel::read_from(cleaned.as_bytes()).map_err(|_| FeedError::ParseFailed {
                url: feed_url.to_string(),
                source: first_error,
            })?
        }
    };

    let episodes = channel.items().iter().map(parse_episode).collect();

    let image_url = channel
        .itunes_ext()
        .and_then(|ext| ext.image())
        .and_then(|url| Url::parse(url).ok())
        .or_else(|| channel.image().and_then(|img| Url::parse(img.url()).ok()));

    Ok(Podcast {
        feed_url: feed_url.to_string(),
        title: clean_title(channel.title()),
        description: Some(channel.description().to_string()).filter(|s| !s.is_empty()),
        image_url,
        episodes,
    })
}

fn parse_episode(item: &rss::Item) -> Episode {
    let mut enclosures: Vec<Enclosure> = Vec::new();

    if let Some(enclosure) = item.enclosure()
        && let Ok(url) = Url::parse(enclosure.url())
    {
        enclosures.push(Enclosure {
            url,
            length: enclosure.length().parse().ok(),
            mime_type: Some(enclosure.mime_type().to_string()).filter(|s| !s.is_empty()),
        });
    }

    // Additional media attached through the Media RSS extension
    let media_contents = item
        .extensions()
        .get("media")
        .and_then(|media| media.get("content"))
        .into_iter()
        .flatten();

    for content in media_contents {
        let attrs = content.attrs();
        let Some(url) = attrs.get("url").and_then(|u| Url::parse(u).ok()) else {
            continue;
        };
        if enclosures.iter().any(|e| e.url == url) {
            continue;
        }
        enclosures.push(Enclosure {
            url,
            length: attrs.get("fileSize").and_then(|l| l.parse().ok()),
            mime_type: attrs.get("type").cloned().filter(|s| !s.is_empty()),
        });
    }

    Episode {
        title: item
            .title()
            .map(clean_title)
            .unwrap_or_else(|| "Untitled Episode".to_string()),
        description: item
            .description()
            .map(String::from)
            .filter(|s| !s.trim().is_empty()),
        guid: item.guid().map(|g| g.value().to_string()),
        image_url: item
            .itunes_ext()
            .and_then(|ext| ext.image())
            .and_then(|url| Url::parse(url).ok()),
        enclosures,
    }
}

fn clean_title(raw: &str) -> String {
    html_escape::decode_html_entities(raw.trim()).into_owned()
}

/// Remove characters outside the XML 1.0 `Char` production
fn strip_invalid_xml_chars(text: &str) -> Cow<'_, str> {
    fn is_valid(c: char) -> bool {
        matches!(c,
            '\u{9}' | '\u{A}' | '\u{D}'
            | '\u{20}'..='\u{D7FF}'
            | '\u{E000}'..='\u{FFFD}'
            | '\u{10000}'..='\u{10FFFF}')
    }

    if text.chars().all(is_valid) {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(text.chars().filter(|&c| is_valid(c)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED_URL: &str = "https://example.com/feed.xml";

    const SAMPLE_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd" xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <title>  Test &amp; Podcast  </title>
    <description>A test podcast for unit testing</description>
    <link>https://example.com</link>
    <itunes:image href="https://example.com/image.jpg"/>
    <item>
      <title>Episode 1</title>
      <description>&lt;p&gt;First episode&lt;/p&gt;</description>
      <guid>ep1-guid</guid>
      <enclosure url="https://example.com/ep1.mp3" length="1234567" type="audio/mpeg"/>
      <media:content url="https://example.com/ep1.mp3" type="audio/mpeg"/>
      <media:content url="https://example.com/ep1-bonus.m4a" type="audio/x-m4a" fileSize="42"/>
      <itunes:image href="https://example.com/ep1.png"/>
    </item>
    <item>
      <title>Episode 2</title>
      <enclosure url="https://example.com/ep2.mp3" type="audio/mpeg"/>
    </item>
    <item>
      <title>Trailer</title>
      <description>Text only</description>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn parse_feed_extracts_podcast_metadata() {
        let podcast = parse_feed(SAMPLE_FEED.as_bytes(), FEED_URL).unwrap();

        assert_eq!(podcast.title, "Test & Podcast");
        assert_eq!(
            podcast.description,
            Some("A test podcast for unit testing".to_string())
        );
        assert_eq!(
            podcast.image_url,
            Some(Url::parse("https://example.com/image.jpg").unwrap())
        );
        assert_eq!(podcast.feed_url, FEED_URL);
    }

    #[test]
    fn parse_feed_collects_enclosures_and_media_content() {
        let podcast = parse_feed(SAMPLE_FEED.as_bytes(), FEED_URL).unwrap();
        let ep1 = &podcast.episodes[0];

        assert_eq!(ep1.title, "Episode 1");
        assert_eq!(ep1.guid, Some("ep1-guid".to_string()));
        assert_eq!(ep1.description.as_deref(), Some("<p>First episode</p>"));
        assert_eq!(
            ep1.image_url,
            Some(Url::parse("https://example.com/ep1.png").unwrap())
        );

        let urls: Vec<_> = ep1.enclosures.iter().map(|e| e.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://example.com/ep1.mp3",
                "https://example.com/ep1-bonus.m4a"
            ]
        );
        assert_eq!(ep1.enclosures[0].length, Some(1234567));
        assert_eq!(ep1.enclosures[1].length, Some(42));
        assert_eq!(ep1.enclosures[1].mime_type.as_deref(), Some("audio/x-m4a"));
    }

    #[test]
    fn parse_feed_keeps_items_without_enclosure() {
        let podcast = parse_feed(SAMPLE_FEED.as_bytes(), FEED_URL).unwrap();

        assert_eq!(podcast.episodes.len(), 3);
        let trailer = &podcast.episodes[2];
        assert!(trailer.enclosures.is_empty());
        assert_eq!(trailer.description.as_deref(), Some("Text only"));
    }

    #[test]
    fn parse_feed_handles_missing_optional_fields() {
        let podcast = parse_feed(SAMPLE_FEED.as_bytes(), FEED_URL).unwrap();
        let ep2 = &podcast.episodes[1];

        assert!(ep2.description.is_none());
        assert!(ep2.guid.is_none());
        assert!(ep2.image_url.is_none());
        assert_eq!(ep2.enclosures.len(), 1);
    }

    #[test]
    fn parse_feed_recovers_from_invalid_xml_characters() {
        let dirty = SAMPLE_FEED.replace("First episode", "First\u{1}episode");
        let podcast = parse_feed(dirty.as_bytes(), FEED_URL).unwrap();
        assert_eq!(podcast.episodes.len(), 3);
        assert_eq!(podcast.episodes[0].title, "Episode 1");
    }

    #[test]
    fn parse_feed_rejects_non_rss() {
        let result = parse_feed(b"<html><body>nope</body></html>", FEED_URL);
        assert!(matches!(result, Err(FeedError::ParseFailed { .. })));
    }

    #[test]
    fn strip_invalid_xml_chars_keeps_valid_text() {
        assert!(matches!(
            strip_invalid_xml_chars("plain\ttext\n"),
            Cow::Borrowed(_)
        ));
        assert_eq!(strip_invalid_xml_chars("a\u{0}b\u{1F}c"), "abc");
    }
}
