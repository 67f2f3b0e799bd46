use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::api::{self, Category, FetchError, Item, ItemSource};
use crate::cache::{CachePolicy, PostCache};
use crate::comments::{CommentLevel, Thread, Toggle};
use crate::text;

pub const DEFAULT_BATCH_SIZE: usize = 5;
pub const DEFAULT_LOAD_DELAY: Duration = Duration::from_secs(5);

/// Poll ids shown when no list is configured. The API has no poll listing.
pub const DEFAULT_POLL_IDS: [i64; 10] = [
    45786777, 45388341, 44639573, 44571809, 44559942, 44525309, 44495538, 44436795, 44406518,
    44295902,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKind {
    Stories,
    Jobs,
    Polls,
}

impl SectionKind {
    pub fn title(&self) -> &'static str {
        match self {
            SectionKind::Stories => "Stories",
            SectionKind::Jobs => "Jobs",
            SectionKind::Polls => "Polls",
        }
    }

    fn idle_label(&self) -> &'static str {
        match self {
            SectionKind::Stories => "Load Stories",
            SectionKind::Jobs => "Load Jobs",
            SectionKind::Polls => "Load polls",
        }
    }

    fn more_label(&self) -> &'static str {
        match self {
            SectionKind::Stories => "Load more stories",
            SectionKind::Jobs => "Load More Jobs",
            SectionKind::Polls => "Load More Polls",
        }
    }

    fn body_labels(&self) -> (&'static str, &'static str) {
        match self {
            SectionKind::Polls => ("Show description", "Hide description"),
            SectionKind::Stories | SectionKind::Jobs => ("Show text", "Hide text"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedSource {
    /// A listing endpoint such as `topstories.json`.
    Category(Category),
    /// A fixed list of ids, resolved one by one.
    Fixed(Vec<i64>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedSettings {
    pub batch_size: usize,
    pub load_delay: Duration,
    pub cache_policy: CachePolicy,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            load_delay: DEFAULT_LOAD_DELAY,
            cache_policy: CachePolicy::Retain,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Hidden,
    Visible,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadRejected {
    #[error("a load is already in progress")]
    InFlight,
    #[error("please wait {}s before loading more", .remaining.as_secs().max(1))]
    Throttled { remaining: Duration },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOption {
    pub text: String,
    pub votes: i64,
}

/// One rendered item inside a section.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub item: Item,
    pub posted: String,
    pub body_visible: bool,
    pub options: Vec<PollOption>,
    pub comments: Option<Thread>,
}

impl Block {
    fn new(item: Item, options: Vec<PollOption>) -> Self {
        let comments = if item.kids.is_empty() {
            None
        } else {
            Some(Thread::root(item.id, item.comment_count()))
        };
        Self {
            posted: text::format_timestamp(item.time),
            item,
            body_visible: false,
            options,
            comments,
        }
    }

    pub fn title(&self) -> &str {
        self.item.title.as_deref().unwrap_or("No title")
    }

    pub fn body(&self) -> String {
        match self.item.text.as_deref() {
            Some(body) if !body.trim().is_empty() => text::html_to_text(body),
            _ => "No description available".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fetched {
    pub item: Item,
    pub options: Vec<PollOption>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Work {
    Category {
        category: Category,
        offset: usize,
        count: usize,
    },
    Fixed {
        ids: Vec<i64>,
    },
}

/// Network half of a load, safe to run off the UI thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadPlan {
    pub section: SectionKind,
    generation: u64,
    work: Work,
}

#[derive(Debug)]
pub struct LoadBatch {
    pub section: SectionKind,
    generation: u64,
    pub result: Result<Vec<Fetched>, FetchError>,
}

impl LoadPlan {
    pub fn execute(&self, source: &dyn ItemSource) -> LoadBatch {
        let result = match &self.work {
            Work::Category {
                category,
                offset,
                count,
            } => api::fetch_category(source, *category, offset + count).map(|mut items| {
                sort_newest_first(&mut items);
                items
                    .into_iter()
                    .skip(*offset)
                    .map(|item| Fetched {
                        item,
                        options: Vec::new(),
                    })
                    .collect()
            }),
            Work::Fixed { ids } => {
                let mut items: Vec<Fetched> = ids
                    .iter()
                    .filter_map(|&id| api::fetch_item(source, id))
                    .map(|item| {
                        let options = poll_options(source, &item);
                        Fetched { item, options }
                    })
                    .collect();
                items.sort_by(|a, b| b.item.time.cmp(&a.item.time));
                Ok(items)
            }
        };
        LoadBatch {
            section: self.section,
            generation: self.generation,
            result,
        }
    }
}

fn sort_newest_first(items: &mut [Item]) {
    items.sort_by(|a, b| b.time.cmp(&a.time));
}

fn poll_options(source: &dyn ItemSource, item: &Item) -> Vec<PollOption> {
    item.parts
        .iter()
        .filter_map(|&part| api::fetch_item(source, part))
        .map(|part| PollOption {
            text: part
                .text
                .as_deref()
                .map(text::html_to_text)
                .unwrap_or_default(),
            votes: part.score.unwrap_or(0),
        })
        .collect()
}

/// Request to load one comment level under a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentRequest {
    pub section: SectionKind,
    pub block: usize,
    pub path: Vec<usize>,
    pub item_id: i64,
    generation: u64,
}

pub struct FeedController {
    kind: SectionKind,
    source: FeedSource,
    settings: FeedSettings,
    visibility: Visibility,
    items_loaded: usize,
    last_load: Option<Instant>,
    in_flight: bool,
    generation: u64,
    blocks: Vec<Block>,
    error: Option<String>,
}

impl FeedController {
    pub fn new(kind: SectionKind, source: FeedSource, settings: FeedSettings) -> Self {
        let mut settings = settings;
        if settings.batch_size == 0 {
            settings.batch_size = DEFAULT_BATCH_SIZE;
        }
        Self {
            kind,
            source,
            settings,
            visibility: Visibility::Hidden,
            items_loaded: 0,
            last_load: None,
            in_flight: false,
            generation: 0,
            blocks: Vec::new(),
            error: None,
        }
    }

    pub fn kind(&self) -> SectionKind {
        self.kind
    }

    pub fn is_visible(&self) -> bool {
        self.visibility == Visibility::Visible
    }

    pub fn items_loaded(&self) -> usize {
        self.items_loaded
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn load_label(&self) -> &'static str {
        if self.in_flight {
            "Loading..."
        } else if self.items_loaded == 0 {
            self.kind.idle_label()
        } else {
            self.kind.more_label()
        }
    }

    pub fn body_label(&self, block: &Block) -> &'static str {
        let (show, hide) = self.kind.body_labels();
        if block.body_visible {
            hide
        } else {
            show
        }
    }

    /// Header activation: shows the section and starts its first load, or
    /// hides it.
    pub fn toggle(
        &mut self,
        now: Instant,
        cache: &mut PostCache,
    ) -> Option<Result<LoadPlan, LoadRejected>> {
        match self.visibility {
            Visibility::Visible => {
                self.collapse(cache);
                None
            }
            Visibility::Hidden => {
                // Stays hidden while a batch from before the last collapse is
                // still running.
                let load = self.begin_load(now, cache);
                if load.is_ok() {
                    self.visibility = Visibility::Visible;
                }
                Some(load)
            }
        }
    }

    /// Hides the section. Fixed-list sections forget their own items so the
    /// next open shows them again; the cache policy then applies.
    pub fn collapse(&mut self, cache: &mut PostCache) {
        if matches!(self.source, FeedSource::Fixed(_)) {
            for block in &self.blocks {
                cache.remove(block.item.id);
            }
        }
        self.visibility = Visibility::Hidden;
        self.blocks.clear();
        self.items_loaded = 0;
        self.last_load = None;
        self.error = None;
        self.generation += 1;
        self.settings.cache_policy.apply(cache);
        debug!(section = self.kind.title(), "section collapsed");
    }

    pub fn begin_load(&mut self, now: Instant, cache: &PostCache) -> Result<LoadPlan, LoadRejected> {
        if self.in_flight {
            info!(section = self.kind.title(), "load already in progress");
            return Err(LoadRejected::InFlight);
        }
        if self.items_loaded > 0 {
            if let Some(last) = self.last_load {
                let elapsed = now.saturating_duration_since(last);
                if elapsed < self.settings.load_delay {
                    let remaining = self.settings.load_delay - elapsed;
                    info!(
                        section = self.kind.title(),
                        "please wait {}s before loading more",
                        self.settings.load_delay.as_secs()
                    );
                    return Err(LoadRejected::Throttled { remaining });
                }
            }
        }

        self.in_flight = true;
        self.last_load = Some(now);
        self.error = None;

        let work = match &self.source {
            FeedSource::Category(category) => Work::Category {
                category: *category,
                offset: self.items_loaded,
                count: self.settings.batch_size,
            },
            FeedSource::Fixed(ids) => {
                let end = (self.items_loaded + self.settings.batch_size).min(ids.len());
                let start = self.items_loaded.min(end);
                let ids = ids[start..end]
                    .iter()
                    .copied()
                    .filter(|&id| {
                        if cache.has(id) {
                            info!(id, "already displayed, skipping");
                            false
                        } else {
                            true
                        }
                    })
                    .collect();
                Work::Fixed { ids }
            }
        };

        Ok(LoadPlan {
            section: self.kind,
            generation: self.generation,
            work,
        })
    }

    pub fn finish_load(&mut self, batch: LoadBatch, cache: &mut PostCache) {
        self.in_flight = false;
        if batch.generation != self.generation {
            debug!(
                section = self.kind.title(),
                "discarding batch for a collapsed section"
            );
            return;
        }
        match batch.result {
            Ok(fetched) => {
                for Fetched { item, options } in fetched {
                    cache.add(&item);
                    self.blocks.push(Block::new(item, options));
                }
                self.items_loaded += self.settings.batch_size;
            }
            Err(err) => {
                warn!(section = self.kind.title(), error = %err, "load failed");
                self.error = Some(format!("Error loading {}", self.kind.title().to_lowercase()));
            }
        }
    }

    /// Runs a whole load on the calling thread.
    pub fn load_blocking(
        &mut self,
        source: &dyn ItemSource,
        cache: &mut PostCache,
        now: Instant,
    ) -> Result<(), LoadRejected> {
        let plan = self.begin_load(now, cache)?;
        let batch = plan.execute(source);
        self.finish_load(batch, cache);
        Ok(())
    }

    pub fn toggle_body(&mut self, block: usize) -> bool {
        match self.blocks.get_mut(block) {
            Some(block) => {
                block.body_visible = !block.body_visible;
                true
            }
            None => false,
        }
    }

    pub fn thread_mut(&mut self, block: usize, path: &[usize]) -> Option<&mut Thread> {
        self.blocks
            .get_mut(block)?
            .comments
            .as_mut()?
            .find_mut(path)
    }

    /// Comment control activation. Returns a request when a level must be fetched.
    pub fn toggle_comments(&mut self, block: usize, path: &[usize]) -> Option<CommentRequest> {
        let section = self.kind;
        let generation = self.generation;
        let thread = self.thread_mut(block, path)?;
        match thread.toggle() {
            Toggle::Load(item_id) => Some(CommentRequest {
                section,
                block,
                path: path.to_vec(),
                item_id,
                generation,
            }),
            Toggle::Collapsed | Toggle::Busy => None,
        }
    }

    pub fn finish_comments(
        &mut self,
        request: &CommentRequest,
        result: Result<CommentLevel, FetchError>,
    ) -> bool {
        if request.generation != self.generation {
            return false;
        }
        match self.thread_mut(request.block, &request.path) {
            Some(thread) if thread.parent == request.item_id => thread.finish(result),
            _ => false,
        }
    }
}
