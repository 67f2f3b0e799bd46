use std::collections::HashSet;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use tracing::{debug, error};

use crate::api::{self, FetchError, Item, ItemSource};
use crate::text;

pub const BANNER_TEXT: &str = "new post available!";
pub const ERROR_TEXT: &str = "Error loading latest news. Will retry in 5 seconds...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewsSettings {
    pub refresh_interval: Duration,
    pub banner_ttl: Duration,
    pub count: usize,
    pub scan_limit: usize,
}

impl Default for NewsSettings {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(5),
            banner_ttl: Duration::from_secs(3),
            count: 5,
            scan_limit: api::DEFAULT_SCAN_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewsEntry {
    pub item: Item,
    pub posted: String,
    pub is_new: bool,
}

impl NewsEntry {
    pub fn headline(&self) -> String {
        match self.item.title.as_deref() {
            Some(title) if !title.is_empty() => title.to_string(),
            _ => format!("{} by {}", self.item.kind.as_str(), self.item.author()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Banner {
    pub shown_at: Instant,
    pub new_items: usize,
}

/// Work for one refresh; runs off the UI thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewsRequest {
    count: usize,
    scan_limit: usize,
}

impl NewsRequest {
    pub fn execute(&self, source: &dyn ItemSource) -> Result<Vec<Item>, FetchError> {
        api::fetch_latest(source, self.count, self.scan_limit)
    }
}

/// Always-on feed of the newest items, refreshed on a fixed interval.
pub struct NewsTicker {
    settings: NewsSettings,
    previous_ids: HashSet<i64>,
    entries: Vec<NewsEntry>,
    banner: Option<Banner>,
    last_started: Option<Instant>,
    last_updated: Option<DateTime<Local>>,
    in_flight: bool,
    error: Option<String>,
}

impl NewsTicker {
    pub fn new(settings: NewsSettings) -> Self {
        Self {
            settings,
            previous_ids: HashSet::new(),
            entries: Vec::new(),
            banner: None,
            last_started: None,
            last_updated: None,
            in_flight: false,
            error: None,
        }
    }

    pub fn entries(&self) -> &[NewsEntry] {
        &self.entries
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight
    }

    pub fn last_updated(&self) -> Option<DateTime<Local>> {
        self.last_updated
    }

    /// Returns the banner while it is still on screen.
    pub fn banner(&self, now: Instant) -> Option<Banner> {
        self.banner
            .filter(|banner| now.saturating_duration_since(banner.shown_at) < self.settings.banner_ttl)
    }

    /// Timer tick. Starts a refresh when the interval has passed, unless the
    /// previous one is still running.
    pub fn tick(&mut self, now: Instant) -> Option<NewsRequest> {
        if self.in_flight {
            if self.is_due(now) {
                debug!("news refresh still running, skipping tick");
            }
            return None;
        }
        if !self.is_due(now) {
            return None;
        }
        self.in_flight = true;
        self.last_started = Some(now);
        Some(NewsRequest {
            count: self.settings.count,
            scan_limit: self.settings.scan_limit,
        })
    }

    fn is_due(&self, now: Instant) -> bool {
        match self.last_started {
            Some(last) => now.saturating_duration_since(last) >= self.settings.refresh_interval,
            None => true,
        }
    }

    pub fn finish(&mut self, result: Result<Vec<Item>, FetchError>, now: Instant) {
        self.in_flight = false;
        let mut items = match result {
            Ok(items) => items,
            Err(err) => {
                error!(error = %err, "error fetching news");
                self.entries.clear();
                self.error = Some(ERROR_TEXT.to_string());
                return;
            }
        };
        items.sort_by(|a, b| b.time.cmp(&a.time));

        let current: HashSet<i64> = items.iter().map(|item| item.id).collect();
        let entries: Vec<NewsEntry> = items
            .into_iter()
            .map(|item| NewsEntry {
                posted: text::format_timestamp(item.time),
                is_new: !self.previous_ids.contains(&item.id),
                item,
            })
            .collect();
        let new_items = entries.iter().filter(|entry| entry.is_new).count();
        if new_items > 0 {
            self.banner = Some(Banner {
                shown_at: now,
                new_items,
            });
        }

        self.previous_ids = current;
        self.entries = entries;
        self.error = None;
        self.last_updated = Some(Local::now());
    }
}
