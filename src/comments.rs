use std::thread;

use crate::api::{fetch_item, FetchError, Item, ItemSource};

/// Maximum number of children resolved per level.
pub const DEFAULT_FANOUT: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub enum CommentLevel {
    /// The parent has no children.
    Empty,
    Comments(Vec<CommentNode>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommentNode {
    pub item: Item,
    /// Present only when the comment has replies.
    pub replies: Option<Thread>,
}

impl CommentNode {
    pub fn new(item: Item) -> Self {
        let replies = if item.kids.is_empty() {
            None
        } else {
            Some(Thread::replies(item.id, item.kids.len() as i64))
        };
        Self { item, replies }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ThreadState {
    #[default]
    Collapsed,
    Loading,
    Expanded(CommentLevel),
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadKind {
    /// Top-level comments of a feed item.
    Root,
    /// Replies under a comment.
    Replies,
}

/// Outcome of activating a thread control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    /// The thread switched to loading; fetch the children of this id.
    Load(i64),
    Collapsed,
    /// A load is already running.
    Busy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Thread {
    pub parent: i64,
    pub kind: ThreadKind,
    pub count: i64,
    pub state: ThreadState,
}

impl Thread {
    pub fn root(parent: i64, count: i64) -> Self {
        Self {
            parent,
            kind: ThreadKind::Root,
            count,
            state: ThreadState::Collapsed,
        }
    }

    pub fn replies(parent: i64, count: i64) -> Self {
        Self {
            parent,
            kind: ThreadKind::Replies,
            count,
            state: ThreadState::Collapsed,
        }
    }

    pub fn label(&self) -> String {
        match (&self.state, self.kind) {
            (ThreadState::Loading, _) => "Loading...".to_string(),
            (ThreadState::Expanded(_), ThreadKind::Root) => "Hide Comments".to_string(),
            (ThreadState::Expanded(_), ThreadKind::Replies) => "Hide replies".to_string(),
            (_, ThreadKind::Root) => format!("Load Comments ({})", self.count),
            (_, ThreadKind::Replies) => format!("Load {} replies", self.count),
        }
    }

    pub fn toggle(&mut self) -> Toggle {
        match self.state {
            ThreadState::Loading => Toggle::Busy,
            ThreadState::Expanded(_) => {
                self.state = ThreadState::Collapsed;
                Toggle::Collapsed
            }
            ThreadState::Collapsed | ThreadState::Failed(_) => {
                self.state = ThreadState::Loading;
                Toggle::Load(self.parent)
            }
        }
    }

    /// Applies a finished load. Ignored unless the thread is still loading.
    pub fn finish(&mut self, result: Result<CommentLevel, FetchError>) -> bool {
        if self.state != ThreadState::Loading {
            return false;
        }
        self.state = match result {
            Ok(level) => ThreadState::Expanded(level),
            Err(err) => {
                tracing::error!(parent = self.parent, error = %err, "error loading comments");
                ThreadState::Failed("Error loading comments".to_string())
            }
        };
        true
    }

    /// Follows `path` (child indices) through expanded levels.
    pub fn find_mut(&mut self, path: &[usize]) -> Option<&mut Thread> {
        let Some((&first, rest)) = path.split_first() else {
            return Some(self);
        };
        match &mut self.state {
            ThreadState::Expanded(CommentLevel::Comments(nodes)) => nodes
                .get_mut(first)
                .and_then(|node| node.replies.as_mut())
                .and_then(|thread| thread.find_mut(rest)),
            _ => None,
        }
    }
}

/// Loads one level of comments under `id`.
///
/// At most `fanout` children are requested, concurrently. Children that fail
/// to load are dropped, as are deleted and dead ones; survivors come back
/// newest first.
pub fn load_comments(
    source: &dyn ItemSource,
    id: i64,
    fanout: usize,
) -> Result<CommentLevel, FetchError> {
    let parent = source.item(id)?;
    if parent.kids.is_empty() {
        return Ok(CommentLevel::Empty);
    }

    let kids = &parent.kids[..parent.kids.len().min(fanout)];
    let mut comments: Vec<Item> = thread::scope(|scope| {
        let handles: Vec<_> = kids
            .iter()
            .map(|&kid| scope.spawn(move || fetch_item(source, kid)))
            .collect();
        handles
            .into_iter()
            .filter_map(|handle| handle.join().ok().flatten())
            .collect()
    });
    comments.sort_by(|a, b| b.time.cmp(&a.time));

    Ok(CommentLevel::Comments(
        comments
            .into_iter()
            .filter(Item::is_visible)
            .map(CommentNode::new)
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ItemType, MemorySource};

    fn comment(id: i64, time: i64, kids: Vec<i64>) -> Item {
        Item {
            id,
            kind: ItemType::Comment,
            by: Some(format!("c{id}")),
            time,
            text: Some(format!("comment {id}")),
            kids,
            ..Item::default()
        }
    }

    fn ids(level: &CommentLevel) -> Vec<i64> {
        match level {
            CommentLevel::Comments(nodes) => nodes.iter().map(|node| node.item.id).collect(),
            CommentLevel::Empty => Vec::new(),
        }
    }

    #[test]
    fn failed_child_is_dropped_and_rest_sorted_newest_first() {
        let source = MemorySource::new()
            .with_item(comment(100, 0, vec![1, 2, 3]))
            .with_item(comment(1, 10, vec![]))
            .with_item(comment(3, 30, vec![]))
            .failing(2);
        let level = load_comments(&source, 100, DEFAULT_FANOUT).unwrap();
        assert_eq!(ids(&level), vec![3, 1]);
    }

    #[test]
    fn no_kids_is_empty_level() {
        let source = MemorySource::new().with_item(comment(5, 0, vec![]));
        assert_eq!(
            load_comments(&source, 5, DEFAULT_FANOUT).unwrap(),
            CommentLevel::Empty
        );
    }

    #[test]
    fn only_first_fanout_children_are_requested() {
        let kids: Vec<i64> = (1..=15).collect();
        let source = MemorySource::new()
            .with_item(comment(100, 0, kids.clone()))
            .with_items(kids.iter().map(|&id| comment(id, id, vec![])));
        let level = load_comments(&source, 100, DEFAULT_FANOUT).unwrap();
        assert_eq!(ids(&level).len(), 10);
        assert_eq!(source.request_count(11), 0);
        assert_eq!(source.request_count(10), 1);
    }

    #[test]
    fn deleted_and_dead_comments_are_hidden() {
        let mut deleted = comment(2, 20, vec![]);
        deleted.deleted = true;
        let mut dead = comment(3, 30, vec![]);
        dead.dead = true;
        let source = MemorySource::new()
            .with_item(comment(100, 0, vec![1, 2, 3]))
            .with_item(comment(1, 10, vec![]))
            .with_items([deleted, dead]);
        let level = load_comments(&source, 100, DEFAULT_FANOUT).unwrap();
        assert_eq!(ids(&level), vec![1]);
    }

    #[test]
    fn parent_failure_is_an_error() {
        let source = MemorySource::new().failing(100);
        assert!(load_comments(&source, 100, DEFAULT_FANOUT).is_err());
    }

    #[test]
    fn toggle_walks_through_states() {
        let mut thread = Thread::root(100, 3);
        assert_eq!(thread.label(), "Load Comments (3)");
        assert_eq!(thread.toggle(), Toggle::Load(100));
        assert_eq!(thread.label(), "Loading...");
        assert_eq!(thread.toggle(), Toggle::Busy);
        assert!(thread.finish(Ok(CommentLevel::Empty)));
        assert_eq!(thread.label(), "Hide Comments");
        assert_eq!(thread.toggle(), Toggle::Collapsed);
        assert_eq!(thread.state, ThreadState::Collapsed);
    }

    #[test]
    fn failed_thread_can_be_retried() {
        let mut thread = Thread::replies(7, 2);
        thread.toggle();
        thread.finish(Err(FetchError::Missing(7)));
        assert!(matches!(thread.state, ThreadState::Failed(_)));
        assert_eq!(thread.label(), "Load 2 replies");
        assert_eq!(thread.toggle(), Toggle::Load(7));
    }

    #[test]
    fn late_result_for_collapsed_thread_is_ignored() {
        let mut thread = Thread::root(1, 1);
        assert!(!thread.finish(Ok(CommentLevel::Empty)));
        assert_eq!(thread.state, ThreadState::Collapsed);
    }

    #[test]
    fn find_mut_follows_expanded_levels() {
        let mut thread = Thread::root(100, 2);
        thread.toggle();
        thread.finish(Ok(CommentLevel::Comments(vec![
            CommentNode::new(comment(1, 10, vec![])),
            CommentNode::new(comment(2, 5, vec![9])),
        ])));
        assert!(thread.find_mut(&[0]).is_none());
        let replies = thread.find_mut(&[1]).unwrap();
        assert_eq!(replies.parent, 2);
        assert_eq!(replies.label(), "Load 1 replies");
        assert!(thread.find_mut(&[1, 0]).is_none());
    }
}
