//! Island news aggregation.
//!
//! General feeds are filtered by keyword, curated feeds are taken as-is.
//! Every article is flagged as recent or not, then the combined list is
//! sorted newest first and truncated.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{FailurePolicy, FeedConfig, NewsConfig, RecentScope, SortKey};
use crate::error::FeedFetchError;
use crate::fetcher::Fetcher;

/// One entry from a feed, using the field names the site's frontend reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_snippet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pub_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iso_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
}

impl FeedItem {
    /// Lowercased title, snippet, content and summary joined by spaces.
    pub fn search_text(&self) -> String {
        [
            &self.title,
            &self.content_snippet,
            &self.content,
            &self.summary,
        ]
        .iter()
        .map(|field| field.as_deref().unwrap_or(""))
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
    }

    /// First present of `pubDate`, `isoDate`, `published`, `date`.
    /// Missing or unparseable dates resolve to the Unix epoch.
    pub fn resolved_timestamp(&self) -> DateTime<Utc> {
        [&self.pub_date, &self.iso_date, &self.published, &self.date]
            .into_iter()
            .find_map(|field| field.as_deref())
            .and_then(parse_timestamp)
            .unwrap_or(DateTime::UNIX_EPOCH)
    }

    pub fn pub_date_timestamp(&self) -> Option<DateTime<Utc>> {
        self.pub_date.as_deref().and_then(parse_timestamp)
    }
}

/// Parse the date formats feeds actually carry: RFC 3339, RFC 2822 (also
/// with an `IST` or `UTC` zone name), ISO-like datetimes with a space or
/// compact offset, and bare dates or datetimes (taken as UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Some(dt) = parse_named_zone(raw) {
        return Some(dt);
    }
    for format in [
        "%Y-%m-%dT%H:%M:%S%.f%z",
        "%Y-%m-%d %H:%M:%S%.f%z",
        "%Y-%m-%d %H:%M:%S%.f %z",
    ] {
        if let Ok(dt) = DateTime::parse_from_str(raw, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// RFC 2822 style dates ending in a zone abbreviation chrono does not know,
/// e.g. `Mon, 09 Dec 2024 17:30:00 IST`.
fn parse_named_zone(raw: &str) -> Option<DateTime<Utc>> {
    let (rest, zone) = raw.rsplit_once(' ')?;
    let offset = match zone {
        "IST" => "+0530",
        "UTC" => "+0000",
        _ => return None,
    };
    DateTime::parse_from_rfc2822(&format!("{} {}", rest, offset))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotatedItem {
    #[serde(flatten)]
    pub item: FeedItem,
    pub is_recent: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IslandNews {
    pub articles: Vec<AnnotatedItem>,
    pub has_recent: bool,
}

/// Case-insensitive substring matcher.
#[derive(Debug, Clone, Default)]
pub struct KeywordSet {
    lowered: Vec<String>,
}

impl KeywordSet {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let lowered = keywords
            .into_iter()
            .map(|k| k.as_ref().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self { lowered }
    }

    pub(crate) fn len(&self) -> usize {
        self.lowered.len()
    }

    pub fn matches(&self, item: &FeedItem) -> bool {
        let text = item.search_text();
        self.lowered.iter().any(|k| text.contains(k.as_str()))
    }
}

/// Ordering and windowing rules applied after fetching.
#[derive(Debug, Clone)]
pub struct NewsSettings {
    pub max_articles: usize,
    pub recent_window: Duration,
    pub sort_key: SortKey,
    pub has_recent_scope: RecentScope,
}

impl Default for NewsSettings {
    fn default() -> Self {
        Self::from(&NewsConfig::default())
    }
}

impl From<&NewsConfig> for NewsSettings {
    fn from(config: &NewsConfig) -> Self {
        Self {
            max_articles: config.max_articles,
            recent_window: Duration::try_days(config.recent_window_days).unwrap_or(Duration::MAX),
            sort_key: config.sort_key,
            has_recent_scope: config.has_recent_scope,
        }
    }
}

/// Combine already fetched items into the response.
///
/// `general` items are kept only when they match `keywords`; `curated`
/// items are kept unconditionally. General items precede curated ones, so
/// the stable sort breaks ties in that order.
pub fn aggregate(
    general: Vec<FeedItem>,
    curated: Vec<FeedItem>,
    keywords: &KeywordSet,
    settings: &NewsSettings,
    now: DateTime<Utc>,
) -> IslandNews {
    let mut articles: Vec<AnnotatedItem> = general
        .into_iter()
        .filter(|item| keywords.matches(item))
        .chain(curated)
        .map(|item| {
            let is_recent = now - item.resolved_timestamp() <= settings.recent_window;
            AnnotatedItem { item, is_recent }
        })
        .collect();

    match settings.sort_key {
        SortKey::PubDate => {
            articles.sort_by_key(|a| std::cmp::Reverse(a.item.pub_date_timestamp()));
        }
        SortKey::Resolved => {
            articles.sort_by_key(|a| std::cmp::Reverse(a.item.resolved_timestamp()));
        }
    }

    let has_recent = match settings.has_recent_scope {
        RecentScope::All => {
            let has_recent = articles.iter().any(|a| a.is_recent);
            articles.truncate(settings.max_articles);
            has_recent
        }
        RecentScope::Returned => {
            articles.truncate(settings.max_articles);
            articles.iter().any(|a| a.is_recent)
        }
    };

    IslandNews {
        articles,
        has_recent,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FeedGroup {
    General,
    Curated,
}

/// Fetches every configured feed per call and aggregates the results.
pub struct NewsAggregator {
    fetcher: Fetcher,
    keywords: KeywordSet,
    settings: NewsSettings,
    general_feeds: Vec<FeedConfig>,
    curated_feeds: Vec<FeedConfig>,
    failure_policy: FailurePolicy,
    max_concurrent_fetches: usize,
}

impl NewsAggregator {
    pub fn new(config: &NewsConfig) -> Result<Self, reqwest::Error> {
        let fetcher = Fetcher::new(
            std::time::Duration::from_secs(config.fetch_timeout_secs),
            &config.user_agent,
        )?;

        let keywords = KeywordSet::new(&config.keywords);
        info!(
            "Watching {} general and {} curated feeds with {} keywords",
            config.general_feeds.len(),
            config.curated_feeds.len(),
            keywords.len()
        );

        Ok(Self {
            fetcher,
            keywords,
            settings: NewsSettings::from(config),
            general_feeds: config.general_feeds.clone(),
            curated_feeds: config.curated_feeds.clone(),
            failure_policy: config.failure_policy,
            max_concurrent_fetches: config.max_concurrent_fetches.max(1),
        })
    }

    pub async fn island_news(&self) -> Result<IslandNews, FeedFetchError> {
        self.island_news_at(Utc::now()).await
    }

    /// Same as [`island_news`](Self::island_news) with an explicit clock.
    pub async fn island_news_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<IslandNews, FeedFetchError> {
        let feeds = self
            .general_feeds
            .iter()
            .map(|feed| (FeedGroup::General, feed))
            .chain(self.curated_feeds.iter().map(|feed| (FeedGroup::Curated, feed)));

        // `buffered` yields in feed order, keeping output identical to a
        // sequential fetch.
        let fetcher = &self.fetcher;
        let fetches: Vec<_> = feeds
            .map(|(group, feed)| async move { (group, feed, fetcher.fetch(&feed.url).await) })
            .collect();
        let mut results = stream::iter(fetches).buffered(self.max_concurrent_fetches);

        let mut general = Vec::new();
        let mut curated = Vec::new();
        let mut failed = 0usize;

        while let Some((group, feed, result)) = results.next().await {
            match result {
                Ok(items) => {
                    info!("Fetched {} items from feed '{}'", items.len(), feed.name);
                    match group {
                        FeedGroup::General => general.extend(items),
                        FeedGroup::Curated => curated.extend(items),
                    }
                }
                Err(e) => match self.failure_policy {
                    FailurePolicy::FailFast => return Err(e),
                    FailurePolicy::SkipFailed => {
                        warn!("Skipping feed '{}': {}", feed.name, e);
                        failed += 1;
                    }
                },
            }
        }

        let news = aggregate(general, curated, &self.keywords, &self.settings, now);
        info!(
            "Aggregated {} articles (has_recent={}, skipped_feeds={})",
            news.articles.len(),
            news.has_recent,
            failed
        );
        Ok(news)
    }
}
