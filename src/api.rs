#[cfg(test)]
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use anyhow::{bail, Result};
#[cfg(test)]
use parking_lot::Mutex;
use reqwest::blocking::Client as HttpClient;
use reqwest::header::USER_AGENT;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const HN_API_BASE: &str = "https://hacker-news.firebaseio.com/v0";
pub const HN_ITEM_URL: &str = "https://news.ycombinator.com/item";

/// Upper bound on ids examined when walking back from `maxitem`.
pub const DEFAULT_SCAN_LIMIT: usize = 500;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status} from {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },
    #[error("item {0} not found")]
    Missing(i64),
    #[error("{0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    Top,
    New,
    Best,
    Ask,
    Show,
    Job,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Top => "topstories",
            Category::New => "newstories",
            Category::Best => "beststories",
            Category::Ask => "askstories",
            Category::Show => "showstories",
            Category::Job => "jobstories",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "top" | "topstories" => Some(Category::Top),
            "new" | "newstories" => Some(Category::New),
            "best" | "beststories" => Some(Category::Best),
            "ask" | "askstories" => Some(Category::Ask),
            "show" | "showstories" => Some(Category::Show),
            "job" | "jobs" | "jobstories" => Some(Category::Job),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    #[default]
    Story,
    Job,
    Poll,
    PollOpt,
    Comment,
    #[serde(other)]
    Unknown,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Story => "story",
            ItemType::Job => "job",
            ItemType::Poll => "poll",
            ItemType::PollOpt => "pollopt",
            ItemType::Comment => "comment",
            ItemType::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Item {
    pub id: i64,
    #[serde(rename = "type", default)]
    pub kind: ItemType,
    #[serde(default)]
    pub by: Option<String>,
    #[serde(default)]
    pub time: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub score: Option<i64>,
    #[serde(default)]
    pub descendants: Option<i64>,
    #[serde(default)]
    pub kids: Vec<i64>,
    #[serde(default)]
    pub parts: Vec<i64>,
    #[serde(default)]
    pub parent: Option<i64>,
    #[serde(default)]
    pub poll: Option<i64>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub dead: bool,
}

impl Item {
    pub fn is_visible(&self) -> bool {
        !self.deleted && !self.dead
    }

    pub fn author(&self) -> &str {
        self.by.as_deref().unwrap_or("unknown")
    }

    pub fn permalink(&self) -> String {
        format!("{}?id={}", HN_ITEM_URL, self.id)
    }

    /// External link when present, otherwise the discussion page.
    pub fn link(&self) -> String {
        match self.url.as_deref() {
            Some(url) if !url.trim().is_empty() => url.to_string(),
            _ => self.permalink(),
        }
    }

    pub fn comment_count(&self) -> i64 {
        self.descendants.unwrap_or(self.kids.len() as i64)
    }
}

/// Read access to the item API. Implementations must tolerate being called
/// from several threads at once.
pub trait ItemSource: Send + Sync {
    fn item(&self, id: i64) -> Result<Item, FetchError>;
    fn category_ids(&self, category: Category) -> Result<Vec<i64>, FetchError>;
    fn max_item(&self) -> Result<i64, FetchError>;
}

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout: Duration,
    pub http_client: Option<HttpClient>,
}

pub struct Client {
    http: HttpClient,
    user_agent: String,
    base_url: String,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.user_agent.trim().is_empty() {
            bail!("hackernews client user agent required");
        }

        let timeout = if config.timeout.is_zero() {
            Duration::from_secs(20)
        } else {
            config.timeout
        };
        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder().timeout(timeout).build()?,
        };

        let base_url = if config.base_url.trim().is_empty() {
            HN_API_BASE.to_string()
        } else {
            config.base_url.trim_end_matches('/').to_string()
        };

        Ok(Client {
            http,
            user_agent: config.user_agent,
            base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, FetchError> {
        let url = format!("{}/{}", self.base_url, path);
        debug!(%url, "GET");
        let response = self
            .http
            .get(&url)
            .header(USER_AGENT, &self.user_agent)
            .send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { status, url });
        }
        Ok(response.json()?)
    }
}

impl ItemSource for Client {
    fn item(&self, id: i64) -> Result<Item, FetchError> {
        // The API answers `null` for ids it does not know.
        let item: Option<Item> = self.get_json(&format!("item/{id}.json"))?;
        item.ok_or(FetchError::Missing(id))
    }

    fn category_ids(&self, category: Category) -> Result<Vec<i64>, FetchError> {
        self.get_json(&format!("{}.json", category.as_str()))
    }

    fn max_item(&self) -> Result<i64, FetchError> {
        self.get_json("maxitem.json")
    }
}

/// Fetches a single item, logging and swallowing any failure.
pub fn fetch_item(source: &dyn ItemSource, id: i64) -> Option<Item> {
    match source.item(id) {
        Ok(item) => Some(item),
        Err(err) => {
            warn!(id, error = %err, "skipping item");
            None
        }
    }
}

/// Resolves `ids` in order, one request at a time, until `n` items have been
/// collected or the ids run out.
pub fn fetch_n(source: &dyn ItemSource, ids: &[i64], n: usize) -> Vec<Item> {
    let mut items = Vec::with_capacity(n.min(ids.len()));
    for &id in ids {
        if items.len() >= n {
            break;
        }
        if let Some(item) = fetch_item(source, id) {
            items.push(item);
        }
    }
    items
}

pub fn fetch_category(
    source: &dyn ItemSource,
    category: Category,
    n: usize,
) -> Result<Vec<Item>, FetchError> {
    let ids = source.category_ids(category)?;
    Ok(fetch_n(source, &ids, n))
}

/// Walks downward from the newest id, collecting up to `n` items and giving
/// up after `scan_limit` ids.
pub fn fetch_latest(
    source: &dyn ItemSource,
    n: usize,
    scan_limit: usize,
) -> Result<Vec<Item>, FetchError> {
    let max = source.max_item()?;
    let floor = max.saturating_sub(scan_limit as i64).max(0);
    let mut items = Vec::with_capacity(n);
    let mut id = max;
    while id > floor && items.len() < n {
        if let Some(item) = fetch_item(source, id) {
            items.push(item);
        }
        id -= 1;
    }
    Ok(items)
}

/// In-memory [`ItemSource`] that records every item request.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct MemorySource {
    items: HashMap<i64, Item>,
    listings: HashMap<Category, Vec<i64>>,
    failing: HashSet<i64>,
    max_item: Option<i64>,
    requests: Mutex<Vec<i64>>,
}

#[cfg(test)]
impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(mut self, item: Item) -> Self {
        self.insert(item);
        self
    }

    pub fn with_items(mut self, items: impl IntoIterator<Item = Item>) -> Self {
        for item in items {
            self.insert(item);
        }
        self
    }

    pub fn with_listing(mut self, category: Category, ids: Vec<i64>) -> Self {
        self.listings.insert(category, ids);
        self
    }

    pub fn with_max_item(mut self, id: i64) -> Self {
        self.max_item = Some(id);
        self
    }

    pub fn failing(mut self, id: i64) -> Self {
        self.failing.insert(id);
        self
    }

    pub fn insert(&mut self, item: Item) {
        self.items.insert(item.id, item);
    }

    pub fn requested(&self) -> Vec<i64> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self, id: i64) -> usize {
        self.requests.lock().iter().filter(|&&seen| seen == id).count()
    }
}

#[cfg(test)]
impl ItemSource for MemorySource {
    fn item(&self, id: i64) -> Result<Item, FetchError> {
        self.requests.lock().push(id);
        if self.failing.contains(&id) {
            return Err(FetchError::Unavailable(format!("item {id} unavailable")));
        }
        self.items.get(&id).cloned().ok_or(FetchError::Missing(id))
    }

    fn category_ids(&self, category: Category) -> Result<Vec<i64>, FetchError> {
        self.listings
            .get(&category)
            .cloned()
            .ok_or_else(|| FetchError::Unavailable(format!("no listing for {}", category.as_str())))
    }

    fn max_item(&self) -> Result<i64, FetchError> {
        self.max_item
            .or_else(|| self.items.keys().copied().max())
            .ok_or_else(|| FetchError::Unavailable("no items".into()))
    }
}

#[cfg(test)]
pub(crate) fn story(id: i64, time: i64) -> Item {
    Item {
        id,
        kind: ItemType::Story,
        by: Some(format!("user{id}")),
        time,
        title: Some(format!("Story {id}")),
        ..Item::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_item_with_missing_fields() {
        let item: Item = serde_json::from_str(
            r#"{"id": 8863, "type": "story", "by": "dhouston", "time": 1175714200,
                "kids": [8952, 9224], "score": 111, "title": "My YC app"}"#,
        )
        .unwrap();
        assert_eq!(item.kind, ItemType::Story);
        assert_eq!(item.kids, vec![8952, 9224]);
        assert!(item.parts.is_empty());
        assert!(item.is_visible());
        assert_eq!(item.link(), "https://news.ycombinator.com/item?id=8863");
    }

    #[test]
    fn unknown_type_is_tolerated() {
        let item: Item = serde_json::from_str(r#"{"id": 1, "type": "launch"}"#).unwrap();
        assert_eq!(item.kind, ItemType::Unknown);
    }

    #[test]
    fn pollopt_type_decodes() {
        let item: Item =
            serde_json::from_str(r#"{"id": 2, "type": "pollopt", "score": 4, "poll": 1}"#).unwrap();
        assert_eq!(item.kind, ItemType::PollOpt);
        assert_eq!(item.poll, Some(1));
    }

    #[test]
    fn fetch_n_skips_failures_and_stops_at_n() {
        let source = MemorySource::new()
            .with_items((1..=5).map(|id| story(id, id)))
            .failing(2);
        let items = fetch_n(&source, &[1, 2, 3, 4, 5], 3);
        let ids: Vec<i64> = items.iter().map(|item| item.id).collect();
        assert_eq!(ids, vec![1, 3, 4]);
        assert_eq!(source.requested(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn fetch_category_propagates_listing_failure() {
        let source = MemorySource::new();
        assert!(fetch_category(&source, Category::Top, 5).is_err());
    }

    #[test]
    fn fetch_latest_walks_down_from_max() {
        let source = MemorySource::new()
            .with_items((90..=100).map(|id| story(id, id)))
            .failing(99);
        let items = fetch_latest(&source, 3, DEFAULT_SCAN_LIMIT).unwrap();
        let ids: Vec<i64> = items.iter().map(|item| item.id).collect();
        assert_eq!(ids, vec![100, 98, 97]);
    }

    #[test]
    fn fetch_latest_respects_scan_limit() {
        let source = MemorySource::new().with_max_item(1_000);
        let items = fetch_latest(&source, 5, 3).unwrap();
        assert!(items.is_empty());
        assert_eq!(source.requested(), vec![1_000, 999, 998]);
    }

    #[test]
    fn category_parse_accepts_endpoint_names() {
        assert_eq!(Category::parse("jobstories"), Some(Category::Job));
        assert_eq!(Category::parse(" Top "), Some(Category::Top));
        assert_eq!(Category::parse("nope"), None);
    }
}
