use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use feed_rs::model::{Entry, FeedType};
use feed_rs::parser;
use html2text::render::text_renderer::TrivialDecorator;
use reqwest::Client;
use tracing::info;

use crate::error::FeedFetchError;
use crate::news::{parse_timestamp, FeedItem};

/// Wide enough that html2text never wraps a snippet.
const SNIPPET_WIDTH: usize = 10_000;

pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;

        Ok(Self { client })
    }

    /// Download and parse one feed document.
    pub async fn fetch(&self, url: &str) -> Result<Vec<FeedItem>, FeedFetchError> {
        info!("Fetching feed: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| FeedFetchError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedFetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|source| FeedFetchError::Request {
                url: url.to_string(),
                source,
            })?;

        Self::parse_items(&bytes).map_err(|source| FeedFetchError::Parse {
            url: url.to_string(),
            source,
        })
    }

    /// Parse RSS 0.9x/1.0/2.0, Atom or JSON Feed bytes into items.
    ///
    /// Entries without an id keep an empty one (dropped from the item), and
    /// dates go through [`parse_timestamp`] so loosely formatted values
    /// still resolve.
    pub fn parse_items(bytes: &[u8]) -> Result<Vec<FeedItem>, parser::ParseFeedError> {
        let parsed = parser::Builder::new()
            .id_generator(|_links, _title, _uri| String::new())
            .timestamp_parser(parse_timestamp)
            .build()
            .parse(bytes)?;
        let feed_type = parsed.feed_type;

        Ok(parsed
            .entries
            .into_iter()
            .map(|entry| Self::item_from_entry(entry, &feed_type))
            .collect())
    }

    /// Map a parsed entry onto the item fields, placing dates under the
    /// field name each dialect uses.
    pub fn item_from_entry(entry: Entry, feed_type: &FeedType) -> FeedItem {
        let content = entry.content.and_then(|c| c.body);
        let summary = entry.summary.map(|s| s.content);
        let content_snippet = content
            .as_deref()
            .or(summary.as_deref())
            .map(Self::snippet)
            .filter(|s| !s.is_empty());

        let mut item = FeedItem {
            title: entry.title.map(|t| t.content),
            link: entry.links.first().map(|l| l.href.clone()),
            guid: Some(entry.id).filter(|id| !id.is_empty()),
            creator: entry.authors.first().map(|p| p.name.clone()),
            content,
            content_snippet,
            summary,
            iso_date: entry.published.or(entry.updated).map(iso),
            categories: entry.categories.into_iter().map(|c| c.term).collect(),
            ..Default::default()
        };

        match feed_type {
            FeedType::RSS0 | FeedType::RSS2 => {
                item.pub_date = entry.published.map(|dt| dt.to_rfc2822());
            }
            FeedType::RSS1 => {
                item.date = entry.published.or(entry.updated).map(iso);
            }
            FeedType::Atom => {
                item.pub_date = entry.updated.map(iso);
                item.published = entry.published.map(iso);
            }
            FeedType::JSON => {
                item.published = entry.published.map(iso);
            }
        }

        item
    }

    /// Plain-text rendering of an HTML fragment on a single line.
    pub fn snippet(html: &str) -> String {
        let text =
            html2text::from_read_with_decorator(html.as_bytes(), SNIPPET_WIDTH, TrivialDecorator::new());
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

fn iso(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
        <rss version="2.0">
            <channel>
                <title>Coastal News</title>
                <link>https://coastal.example.com</link>
                <description>News from the coast</description>
                <item>
                    <title>Ferry service to Havelock resumes</title>
                    <link>https://coastal.example.com/ferry</link>
                    <guid>ferry-1</guid>
                    <description>&lt;p&gt;Boats run &lt;b&gt;daily&lt;/b&gt; again.&lt;/p&gt;</description>
                    <category>Transport</category>
                    <pubDate>Mon, 09 Dec 2024 12:00:00 GMT</pubDate>
                </item>
                <item>
                    <title>Undated item</title>
                    <link>https://coastal.example.com/undated</link>
                </item>
            </channel>
        </rss>
    "#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
        <feed xmlns="http://www.w3.org/2005/Atom">
            <title>Island Blog</title>
            <id>urn:island-blog</id>
            <updated>2024-12-10T08:00:00Z</updated>
            <entry>
                <title>Majuli festival</title>
                <id>urn:majuli-1</id>
                <link href="https://blog.example.com/majuli"/>
                <author><name>Asha</name></author>
                <published>2024-12-08T06:30:00Z</published>
                <updated>2024-12-10T08:00:00Z</updated>
                <summary>Raas festival draws crowds.</summary>
            </entry>
        </feed>
    "#;

    mod parse_tests {
        use super::*;

        #[test]
        fn test_parse_rss_items() {
            let items = Fetcher::parse_items(RSS.as_bytes()).unwrap();
            assert_eq!(items.len(), 2);

            let ferry = &items[0];
            assert_eq!(ferry.title.as_deref(), Some("Ferry service to Havelock resumes"));
            assert_eq!(ferry.link.as_deref(), Some("https://coastal.example.com/ferry"));
            assert_eq!(ferry.guid.as_deref(), Some("ferry-1"));
            assert_eq!(ferry.categories, vec!["Transport"]);
            assert_eq!(ferry.content_snippet.as_deref(), Some("Boats run daily again."));
            assert!(ferry.summary.as_deref().unwrap().contains("<b>daily</b>"));
            assert_eq!(ferry.iso_date.as_deref(), Some("2024-12-09T12:00:00.000Z"));
            assert!(ferry.published.is_none());

            let pub_date = ferry.pub_date.as_deref().unwrap();
            let parsed = DateTime::parse_from_rfc2822(pub_date).unwrap();
            assert_eq!(parsed.with_timezone(&Utc).to_rfc3339(), "2024-12-09T12:00:00+00:00");
        }

        #[test]
        fn test_parse_rss_item_without_dates() {
            let items = Fetcher::parse_items(RSS.as_bytes()).unwrap();
            let undated = &items[1];

            assert!(undated.pub_date.is_none());
            assert!(undated.iso_date.is_none());
            assert!(undated.published.is_none());
            assert!(undated.date.is_none());
            assert!(undated.content_snippet.is_none());
            assert!(undated.guid.is_none());
        }

        #[test]
        fn test_guid_is_stable_across_parses() {
            let first = Fetcher::parse_items(RSS.as_bytes()).unwrap();
            let second = Fetcher::parse_items(RSS.as_bytes()).unwrap();
            assert_eq!(first, second);
        }

        #[test]
        fn test_parse_loosely_formatted_pub_date() {
            let feed = r#"<?xml version="1.0"?>
                <rss version="2.0">
                    <channel>
                        <title>Port Blair Daily</title>
                        <item>
                            <title>Ross Island lights</title>
                            <pubDate>2024-12-09 12:00:00</pubDate>
                        </item>
                        <item>
                            <title>Neil Island jetty</title>
                            <pubDate>Mon, 09 Dec 2024 17:30:00 IST</pubDate>
                        </item>
                    </channel>
                </rss>
            "#;
            let items = Fetcher::parse_items(feed.as_bytes()).unwrap();
            assert_eq!(items.len(), 2);

            for item in &items {
                assert_eq!(item.iso_date.as_deref(), Some("2024-12-09T12:00:00.000Z"));
                let pub_date = item.pub_date.as_deref().unwrap();
                assert_eq!(
                    DateTime::parse_from_rfc2822(pub_date).unwrap().with_timezone(&Utc),
                    DateTime::parse_from_rfc3339("2024-12-09T12:00:00Z").unwrap()
                );
            }
        }

        #[test]
        fn test_parse_atom_items() {
            let items = Fetcher::parse_items(ATOM.as_bytes()).unwrap();
            assert_eq!(items.len(), 1);

            let entry = &items[0];
            assert_eq!(entry.title.as_deref(), Some("Majuli festival"));
            assert_eq!(entry.creator.as_deref(), Some("Asha"));
            assert_eq!(entry.link.as_deref(), Some("https://blog.example.com/majuli"));
            assert_eq!(entry.pub_date.as_deref(), Some("2024-12-10T08:00:00.000Z"));
            assert_eq!(entry.published.as_deref(), Some("2024-12-08T06:30:00.000Z"));
            assert_eq!(entry.iso_date.as_deref(), Some("2024-12-08T06:30:00.000Z"));
            assert_eq!(entry.summary.as_deref(), Some("Raas festival draws crowds."));
        }

        #[test]
        fn test_parse_garbage_fails() {
            assert!(Fetcher::parse_items(b"definitely not a feed").is_err());
        }

        #[test]
        fn test_snippet_strips_markup_and_collapses_whitespace() {
            let html = "<div>\n  <p>Coral   reef</p>\n<p><a href=\"https://x.example\">survey</a></p></div>";
            assert_eq!(Fetcher::snippet(html), "Coral reef survey");
        }
    }

    mod fetch_tests {
        use super::*;

        fn fetcher() -> Fetcher {
            Fetcher::new(Duration::from_secs(5), "test-agent").unwrap()
        }

        #[tokio::test]
        async fn test_fetch_success() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/rss"))
                .respond_with(ResponseTemplate::new(200).set_body_string(RSS))
                .mount(&server)
                .await;

            let items = fetcher().fetch(&format!("{}/rss", server.uri())).await.unwrap();
            assert_eq!(items.len(), 2);
        }

        #[tokio::test]
        async fn test_fetch_http_error_status() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(503))
                .mount(&server)
                .await;

            let url = format!("{}/rss", server.uri());
            let err = fetcher().fetch(&url).await.unwrap_err();
            assert!(matches!(err, FeedFetchError::Status { .. }));
            assert_eq!(err.url(), url);
        }

        #[tokio::test]
        async fn test_fetch_unparseable_body() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(200).set_body_string("<html>nope</html>"))
                .mount(&server)
                .await;

            let err = fetcher()
                .fetch(&format!("{}/rss", server.uri()))
                .await
                .unwrap_err();
            assert!(matches!(err, FeedFetchError::Parse { .. }));
        }

        #[tokio::test]
        async fn test_fetch_timeout() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_string(RSS)
                        .set_delay(Duration::from_secs(3)),
                )
                .mount(&server)
                .await;

            let fetcher = Fetcher::new(Duration::from_millis(200), "test-agent").unwrap();
            let err = fetcher
                .fetch(&format!("{}/rss", server.uri()))
                .await
                .unwrap_err();
            assert!(matches!(err, FeedFetchError::Request { .. }));
        }

        #[tokio::test]
        async fn test_fetch_connection_refused() {
            let err = fetcher()
                .fetch("http://127.0.0.1:1/rss")
                .await
                .unwrap_err();
            assert!(matches!(err, FeedFetchError::Request { .. }));
        }
    }
}
