use std::io::{self, Stdout};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossbeam_channel::{unbounded, Receiver, Sender};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block as Panel, Borders, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use textwrap::{wrap, Options as WrapOptions};
use tracing::debug;

use crate::api::{FetchError, Item, ItemSource, ItemType};
use crate::cache::PostCache;
use crate::comments::{self, CommentLevel, Thread, ThreadState};
use crate::feed::{Block, CommentRequest, FeedController, LoadBatch, LoadPlan};
use crate::news::{NewsRequest, NewsTicker, BANNER_TEXT};
use crate::text;

const COLOR_BG: Color = Color::Rgb(30, 30, 46);
const COLOR_PANEL_BG: Color = Color::Rgb(24, 24, 36);
const COLOR_PANEL_FOCUSED_BG: Color = Color::Rgb(49, 50, 68);
const COLOR_PANEL_SELECTED_BG: Color = Color::Rgb(69, 71, 90);
const COLOR_BORDER_IDLE: Color = Color::Rgb(49, 50, 68);
const COLOR_TEXT_PRIMARY: Color = Color::Rgb(205, 214, 244);
const COLOR_TEXT_SECONDARY: Color = Color::Rgb(166, 173, 200);
const COLOR_ACCENT: Color = Color::Rgb(137, 180, 250);
const COLOR_SUCCESS: Color = Color::Rgb(166, 227, 161);
const COLOR_ERROR: Color = Color::Rgb(243, 139, 168);

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const DEFAULT_WIDTH: usize = 80;

/// What activating a row does.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Action {
    ToggleSection(usize),
    LoadMore(usize),
    ToggleBody {
        feed: usize,
        block: usize,
    },
    ToggleComments {
        feed: usize,
        block: usize,
        path: Vec<usize>,
    },
}

struct Row {
    line: Line<'static>,
    action: Option<Action>,
    link: Option<String>,
}

impl Row {
    fn text(content: String, style: Style) -> Self {
        Self {
            line: Line::from(Span::styled(content, style)),
            action: None,
            link: None,
        }
    }

    fn control(line: Line<'static>, action: Action) -> Self {
        Self {
            line,
            action: Some(action),
            link: None,
        }
    }

    fn blank() -> Self {
        Self {
            line: Line::default(),
            action: None,
            link: None,
        }
    }

    fn is_selectable(&self) -> bool {
        self.action.is_some()
    }
}

fn secondary() -> Style {
    Style::default().fg(COLOR_TEXT_SECONDARY)
}

fn button(indent: &str, label: &str) -> Line<'static> {
    Line::from(vec![
        Span::raw(indent.to_string()),
        Span::styled(format!("[{label}]"), Style::default().fg(COLOR_ACCENT)),
    ])
}

fn push_wrapped(rows: &mut Vec<Row>, body: &str, indent: &str, width: usize, style: Style) {
    let available = width.saturating_sub(indent.len()).max(10);
    for paragraph in body.split('\n') {
        if paragraph.trim().is_empty() {
            rows.push(Row::blank());
            continue;
        }
        for piece in wrap(paragraph, WrapOptions::new(available)) {
            rows.push(Row::text(format!("{indent}{piece}"), style));
        }
    }
}

fn item_meta(item: &Item, posted: &str) -> String {
    let mut parts = vec![format!("by {}", item.author()), posted.to_string()];
    if let Some(score) = item.score {
        parts.push(format!("{score} points"));
    }
    if let Some(descendants) = item.descendants {
        parts.push(format!("{descendants} comments"));
    }
    if item.kind != ItemType::Story {
        parts.push(format!("type: {}", item.kind.as_str()));
    }
    parts.join(" · ")
}

fn build_rows(feeds: &[FeedController], width: usize) -> Vec<Row> {
    let mut rows = Vec::new();
    for (index, feed) in feeds.iter().enumerate() {
        let marker = if feed.is_visible() { "▾" } else { "▸" };
        rows.push(Row::control(
            Line::from(Span::styled(
                format!("{marker} {}", feed.kind().title()),
                Style::default()
                    .fg(COLOR_TEXT_PRIMARY)
                    .add_modifier(Modifier::BOLD),
            )),
            Action::ToggleSection(index),
        ));
        if !feed.is_visible() {
            continue;
        }

        for (block_index, block) in feed.blocks().iter().enumerate() {
            push_block(&mut rows, feed, index, block_index, block, width);
        }
        if let Some(error) = feed.error() {
            rows.push(Row::text(
                format!("  {error}"),
                Style::default().fg(COLOR_ERROR),
            ));
        }
        rows.push(Row::control(
            button("  ", feed.load_label()),
            Action::LoadMore(index),
        ));
        rows.push(Row::blank());
    }
    rows
}

fn push_block(
    rows: &mut Vec<Row>,
    feed: &FeedController,
    feed_index: usize,
    block_index: usize,
    block: &Block,
    width: usize,
) {
    let toggle_body = Action::ToggleBody {
        feed: feed_index,
        block: block_index,
    };

    let mut title = vec![
        Span::raw("  "),
        Span::styled(
            block.title().to_string(),
            Style::default()
                .fg(COLOR_TEXT_PRIMARY)
                .add_modifier(Modifier::BOLD),
        ),
    ];
    if let Some(host) = block.item.url.as_deref().and_then(text::host_of) {
        title.push(Span::styled(format!(" ({host})"), secondary()));
    }
    rows.push(Row {
        line: Line::from(title),
        action: Some(toggle_body.clone()),
        link: Some(block.item.link()),
    });
    rows.push(Row::text(
        format!("    {}", item_meta(&block.item, &block.posted)),
        secondary(),
    ));
    rows.push(Row::control(
        button("    ", feed.body_label(block)),
        toggle_body,
    ));
    if block.body_visible {
        push_wrapped(
            rows,
            &block.body(),
            "      ",
            width,
            Style::default().fg(COLOR_TEXT_PRIMARY),
        );
    }

    if !block.options.is_empty() {
        rows.push(Row::text("    Poll Options:".to_string(), secondary()));
        for option in &block.options {
            rows.push(Row::text(
                format!("      • {} ({} votes)", option.text, option.votes),
                Style::default().fg(COLOR_TEXT_PRIMARY),
            ));
        }
    }

    if let Some(thread) = &block.comments {
        let mut path = Vec::new();
        push_thread(rows, thread, feed_index, block_index, &mut path, 2, width);
    }
}

fn push_thread(
    rows: &mut Vec<Row>,
    thread: &Thread,
    feed: usize,
    block: usize,
    path: &mut Vec<usize>,
    depth: usize,
    width: usize,
) {
    let indent = "  ".repeat(depth);
    rows.push(Row::control(
        button(&indent, &thread.label()),
        Action::ToggleComments {
            feed,
            block,
            path: path.clone(),
        },
    ));

    let inner = format!("{indent}  ");
    match &thread.state {
        ThreadState::Expanded(CommentLevel::Empty) => {
            rows.push(Row::text(format!("{inner}No comments yet"), secondary()));
        }
        ThreadState::Expanded(CommentLevel::Comments(nodes)) => {
            for (index, node) in nodes.iter().enumerate() {
                rows.push(Row::text(
                    format!(
                        "{inner}{} - {}",
                        node.item.author(),
                        text::format_timestamp(node.item.time)
                    ),
                    Style::default()
                        .fg(COLOR_ACCENT)
                        .add_modifier(Modifier::BOLD),
                ));
                let body = node
                    .item
                    .text
                    .as_deref()
                    .map(text::html_to_text)
                    .unwrap_or_else(|| "[deleted]".to_string());
                push_wrapped(
                    rows,
                    &body,
                    &inner,
                    width,
                    Style::default().fg(COLOR_TEXT_PRIMARY),
                );
                if let Some(replies) = &node.replies {
                    path.push(index);
                    push_thread(rows, replies, feed, block, path, depth + 1, width);
                    path.pop();
                }
            }
        }
        ThreadState::Failed(message) => {
            rows.push(Row::text(
                format!("{inner}{message}"),
                Style::default().fg(COLOR_ERROR),
            ));
        }
        ThreadState::Collapsed | ThreadState::Loading => {}
    }
}

struct Spinner {
    index: usize,
    last_tick: Instant,
}

impl Spinner {
    fn new() -> Self {
        Self {
            index: 0,
            last_tick: Instant::now(),
        }
    }

    fn frame(&self) -> &'static str {
        SPINNER_FRAMES[self.index % SPINNER_FRAMES.len()]
    }

    fn advance(&mut self) -> bool {
        let now = Instant::now();
        if now.duration_since(self.last_tick) >= Duration::from_millis(120) {
            self.index = (self.index + 1) % SPINNER_FRAMES.len();
            self.last_tick = now;
            true
        } else {
            false
        }
    }

    fn reset(&mut self) {
        self.index = 0;
        self.last_tick = Instant::now();
    }
}

enum AsyncResponse {
    Feed(LoadBatch),
    Comments {
        request: CommentRequest,
        result: Result<CommentLevel, FetchError>,
    },
    News {
        result: Result<Vec<Item>, FetchError>,
    },
}

pub struct Options {
    pub source: Arc<dyn ItemSource>,
    pub feeds: Vec<FeedController>,
    pub news: NewsTicker,
    pub comment_fanout: usize,
    pub status_message: String,
}

pub struct Model {
    source: Arc<dyn ItemSource>,
    cache: PostCache,
    feeds: Vec<FeedController>,
    news: NewsTicker,
    comment_fanout: usize,
    rows: Vec<Row>,
    width: usize,
    selected: usize,
    list_state: ListState,
    status_message: String,
    spinner: Spinner,
    pending_comments: usize,
    banner_shown: bool,
    needs_redraw: bool,
    response_tx: Sender<AsyncResponse>,
    response_rx: Receiver<AsyncResponse>,
}

impl Model {
    pub fn new(opts: Options) -> Self {
        let (response_tx, response_rx) = unbounded();
        let rows = build_rows(&opts.feeds, DEFAULT_WIDTH);
        Self {
            source: opts.source,
            cache: PostCache::new(),
            feeds: opts.feeds,
            news: opts.news,
            comment_fanout: opts.comment_fanout.max(1),
            rows,
            width: DEFAULT_WIDTH,
            selected: 0,
            list_state: ListState::default(),
            status_message: opts.status_message,
            spinner: Spinner::new(),
            pending_comments: 0,
            banner_shown: false,
            needs_redraw: true,
            response_tx,
            response_rx,
        }
    }

    pub fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode()?;
        stdout.execute(EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let result = self.event_loop(&mut terminal);

        disable_raw_mode()?;
        terminal.backend_mut().execute(LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        let tick_rate = Duration::from_millis(120);

        loop {
            if self.poll_async() {
                self.mark_dirty();
            }
            self.tick_news(Instant::now());

            if self.needs_redraw {
                terminal.draw(|frame| self.draw(frame))?;
                self.needs_redraw = false;
            }

            let timeout = tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(16));

            if event::poll(timeout)? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        match self.handle_key(key.code) {
                            Ok(true) => break,
                            Ok(false) => {}
                            Err(err) => {
                                self.status_message = format!("Error: {}", err);
                                self.mark_dirty();
                            }
                        }
                    }
                    Event::Resize(_, _) => self.mark_dirty(),
                    _ => {}
                }
            }

            if last_tick.elapsed() >= tick_rate {
                last_tick = Instant::now();
                if self.is_loading() {
                    if self.spinner.advance() {
                        self.mark_dirty();
                    }
                } else {
                    self.spinner.reset();
                }
                let banner = self.news.banner(last_tick).is_some();
                if banner != self.banner_shown {
                    self.banner_shown = banner;
                    self.mark_dirty();
                }
            }
        }

        Ok(())
    }

    fn mark_dirty(&mut self) {
        self.needs_redraw = true;
    }

    fn is_loading(&self) -> bool {
        self.pending_comments > 0 || self.feeds.iter().any(FeedController::is_loading)
    }

    fn rebuild_rows(&mut self, width: usize) {
        self.rows = build_rows(&self.feeds, width);
        if self.selected >= self.rows.len() {
            self.selected = self.rows.len().saturating_sub(1);
        }
        if !self.rows.get(self.selected).is_some_and(Row::is_selectable) {
            self.move_selection(-1);
        }
    }

    fn move_selection(&mut self, delta: isize) {
        let mut index = self.selected as isize;
        loop {
            index += delta;
            if index < 0 || index >= self.rows.len() as isize {
                return;
            }
            if self.rows[index as usize].is_selectable() {
                self.selected = index as usize;
                return;
            }
        }
    }

    fn select_edge(&mut self, last: bool) {
        let found = if last {
            self.rows.iter().rposition(Row::is_selectable)
        } else {
            self.rows.iter().position(Row::is_selectable)
        };
        if let Some(index) = found {
            self.selected = index;
        }
    }

    fn handle_key(&mut self, code: KeyCode) -> Result<bool> {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return Ok(true),
            KeyCode::Char('j') | KeyCode::Down => self.move_selection(1),
            KeyCode::Char('k') | KeyCode::Up => self.move_selection(-1),
            KeyCode::Char('g') | KeyCode::Home => self.select_edge(false),
            KeyCode::Char('G') | KeyCode::End => self.select_edge(true),
            KeyCode::Enter | KeyCode::Char(' ') => self.activate(Instant::now()),
            KeyCode::Char('o') => self.open_link(),
            _ => return Ok(false),
        }
        self.mark_dirty();
        Ok(false)
    }

    fn activate(&mut self, now: Instant) {
        let Some(action) = self
            .rows
            .get(self.selected)
            .and_then(|row| row.action.clone())
        else {
            return;
        };

        match action {
            Action::ToggleSection(index) => {
                let Some(feed) = self.feeds.get_mut(index) else {
                    return;
                };
                let title = feed.kind().title();
                match feed.toggle(now, &mut self.cache) {
                    Some(Ok(plan)) => {
                        self.status_message = format!("Loading {}…", title.to_lowercase());
                        self.spawn_feed_load(plan);
                    }
                    Some(Err(rejected)) => {
                        self.status_message = format!("{title}: {rejected}");
                    }
                    None => {
                        self.status_message = format!("{title} hidden.");
                    }
                }
            }
            Action::LoadMore(index) => {
                let Some(feed) = self.feeds.get_mut(index) else {
                    return;
                };
                let title = feed.kind().title();
                match feed.begin_load(now, &self.cache) {
                    Ok(plan) => {
                        self.status_message = format!("Loading more {}…", title.to_lowercase());
                        self.spawn_feed_load(plan);
                    }
                    Err(rejected) => {
                        self.status_message = format!("{title}: {rejected}");
                    }
                }
            }
            Action::ToggleBody { feed, block } => {
                if let Some(feed) = self.feeds.get_mut(feed) {
                    feed.toggle_body(block);
                }
            }
            Action::ToggleComments { feed, block, path } => {
                let request = self
                    .feeds
                    .get_mut(feed)
                    .and_then(|feed| feed.toggle_comments(block, &path));
                if let Some(request) = request {
                    self.status_message = "Loading comments…".to_string();
                    self.spawn_comment_load(request);
                }
            }
        }
        self.rebuild_rows(self.width);
    }

    fn open_link(&mut self) {
        let Some(url) = self.rows.get(self.selected).and_then(|row| row.link.clone()) else {
            self.status_message = "Select a title to open its link.".to_string();
            return;
        };
        match webbrowser::open(&url) {
            Ok(_) => {
                self.status_message = format!("Opened {url} in your browser.");
            }
            Err(err) => {
                self.status_message = format!("Failed to open link: {err} (URL: {url})");
            }
        }
    }

    fn spawn_feed_load(&self, plan: LoadPlan) {
        let tx = self.response_tx.clone();
        let source = self.source.clone();
        thread::spawn(move || {
            let batch = plan.execute(source.as_ref());
            let _ = tx.send(AsyncResponse::Feed(batch));
        });
    }

    fn spawn_comment_load(&mut self, request: CommentRequest) {
        self.pending_comments += 1;
        let tx = self.response_tx.clone();
        let source = self.source.clone();
        let fanout = self.comment_fanout;
        thread::spawn(move || {
            let result = comments::load_comments(source.as_ref(), request.item_id, fanout);
            let _ = tx.send(AsyncResponse::Comments { request, result });
        });
    }

    fn tick_news(&mut self, now: Instant) {
        let Some(request) = self.news.tick(now) else {
            return;
        };
        self.spawn_news_refresh(request);
    }

    fn spawn_news_refresh(&self, request: NewsRequest) {
        let tx = self.response_tx.clone();
        let source = self.source.clone();
        thread::spawn(move || {
            let result = request.execute(source.as_ref());
            let _ = tx.send(AsyncResponse::News { result });
        });
    }

    fn poll_async(&mut self) -> bool {
        let mut changed = false;
        while let Ok(message) = self.response_rx.try_recv() {
            self.handle_async_response(message);
            changed = true;
        }
        if changed {
            self.rebuild_rows(self.width);
        }
        changed
    }

    fn handle_async_response(&mut self, message: AsyncResponse) {
        match message {
            AsyncResponse::Feed(batch) => {
                let section = batch.section;
                let Some(feed) = self.feeds.iter_mut().find(|feed| feed.kind() == section) else {
                    return;
                };
                feed.finish_load(batch, &mut self.cache);
                self.status_message = match feed.error() {
                    Some(error) => error.to_string(),
                    None if feed.is_visible() => format!(
                        "{}: showing {} items.",
                        section.title(),
                        feed.blocks().len()
                    ),
                    None => format!("{} hidden.", section.title()),
                };
            }
            AsyncResponse::Comments { request, result } => {
                self.pending_comments = self.pending_comments.saturating_sub(1);
                let applied = self
                    .feeds
                    .iter_mut()
                    .find(|feed| feed.kind() == request.section)
                    .is_some_and(|feed| feed.finish_comments(&request, result));
                if !applied {
                    debug!(item = request.item_id, "dropping comments for a closed thread");
                }
                self.status_message = "Comments updated.".to_string();
            }
            AsyncResponse::News { result } => {
                self.news.finish(result, Instant::now());
            }
        }
    }

    fn news_lines(&self, now: Instant) -> Vec<Line<'static>> {
        if let Some(error) = self.news.error() {
            return vec![Line::from(Span::styled(
                error.to_string(),
                Style::default().fg(COLOR_ERROR),
            ))];
        }

        let mut lines = Vec::new();
        if self.news.banner(now).is_some() {
            lines.push(Line::from(Span::styled(
                BANNER_TEXT,
                Style::default()
                    .fg(COLOR_SUCCESS)
                    .add_modifier(Modifier::BOLD),
            )));
        }
        match self.news.last_updated() {
            Some(updated) => lines.push(Line::from(Span::styled(
                format!("Last updated: {}", updated.format("%H:%M:%S")),
                secondary(),
            ))),
            None => lines.push(Line::from(Span::styled(
                "Loading latest news…",
                secondary(),
            ))),
        }

        for entry in self.news.entries() {
            let mut spans = Vec::new();
            if entry.is_new {
                spans.push(Span::styled(
                    "NEW ",
                    Style::default()
                        .fg(COLOR_BG)
                        .bg(COLOR_SUCCESS)
                        .add_modifier(Modifier::BOLD),
                ));
                spans.push(Span::raw(" "));
            }
            spans.push(Span::styled(
                entry.headline(),
                Style::default()
                    .fg(COLOR_TEXT_PRIMARY)
                    .add_modifier(Modifier::BOLD),
            ));
            spans.push(Span::styled(
                format!(" · {}", item_meta(&entry.item, &entry.posted)),
                secondary(),
            ));
            lines.push(Line::from(spans));
        }
        lines
    }

    fn draw(&mut self, frame: &mut Frame<'_>) {
        let full = frame.size();
        frame.render_widget(Panel::default().style(Style::default().bg(COLOR_BG)), full);

        let now = Instant::now();
        let news_lines = self.news_lines(now);
        let news_height = (news_lines.len() as u16 + 2).clamp(4, 12);

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Length(news_height),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(full);

        let status_text = if self.is_loading() {
            format!("{} {}", self.spinner.frame(), self.status_message)
                .trim()
                .to_string()
        } else {
            self.status_message.clone()
        };
        let status_line = Paragraph::new(status_text).style(
            Style::default()
                .fg(COLOR_TEXT_PRIMARY)
                .bg(COLOR_PANEL_FOCUSED_BG)
                .add_modifier(Modifier::BOLD),
        );
        frame.render_widget(status_line, layout[0]);

        let news = Paragraph::new(news_lines)
            .block(
                Panel::default()
                    .title(Span::styled(
                        "Live news",
                        Style::default()
                            .fg(COLOR_ACCENT)
                            .add_modifier(Modifier::BOLD),
                    ))
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(COLOR_BORDER_IDLE))
                    .style(Style::default().bg(COLOR_PANEL_BG)),
            )
            .wrap(Wrap { trim: true });
        frame.render_widget(news, layout[1]);

        self.width = (layout[2].width.saturating_sub(4) as usize).max(20);
        self.rebuild_rows(self.width);
        let items: Vec<ListItem<'static>> = self
            .rows
            .iter()
            .map(|row| ListItem::new(row.line.clone()))
            .collect();
        let list = List::new(items)
            .block(
                Panel::default()
                    .title(Span::styled(
                        "Hacker News",
                        Style::default()
                            .fg(COLOR_ACCENT)
                            .add_modifier(Modifier::BOLD),
                    ))
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(COLOR_BORDER_IDLE))
                    .style(Style::default().bg(COLOR_PANEL_BG)),
            )
            .highlight_style(
                Style::default()
                    .fg(COLOR_TEXT_PRIMARY)
                    .bg(COLOR_PANEL_SELECTED_BG)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("▶ ");
        self.list_state.select(Some(self.selected));
        frame.render_stateful_widget(list, layout[2], &mut self.list_state);

        let footer = Paragraph::new("j/k move · Enter toggle · o open link · g/G top/bottom · q quit")
            .style(
                Style::default()
                    .fg(COLOR_TEXT_SECONDARY)
                    .bg(COLOR_PANEL_BG)
                    .add_modifier(Modifier::ITALIC),
            )
            .alignment(Alignment::Center);
        frame.render_widget(footer, layout[3]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{story, Category, MemorySource};
    use crate::feed::{FeedSettings, FeedSource, SectionKind};
    use crate::news::NewsSettings;

    fn source() -> MemorySource {
        let mut first = story(1, 30);
        first.kids = vec![10];
        first.descendants = Some(1);
        first.url = Some("https://www.example.com/post".into());
        let mut reply = story(10, 40);
        reply.kind = ItemType::Comment;
        reply.kids = vec![11];
        MemorySource::new()
            .with_items([first, story(2, 20), reply])
            .with_listing(Category::Top, vec![1, 2])
    }

    fn feeds() -> Vec<FeedController> {
        vec![
            FeedController::new(
                SectionKind::Stories,
                FeedSource::Category(Category::Top),
                FeedSettings::default(),
            ),
            FeedController::new(
                SectionKind::Jobs,
                FeedSource::Category(Category::Job),
                FeedSettings::default(),
            ),
        ]
    }

    fn model(feeds: Vec<FeedController>) -> Model {
        Model::new(Options {
            source: Arc::new(source()),
            feeds,
            news: NewsTicker::new(NewsSettings::default()),
            comment_fanout: 10,
            status_message: String::new(),
        })
    }

    fn actions(rows: &[Row]) -> Vec<Action> {
        rows.iter().filter_map(|row| row.action.clone()).collect()
    }

    #[test]
    fn hidden_sections_show_only_headers() {
        let rows = build_rows(&feeds(), 80);
        assert_eq!(
            actions(&rows),
            vec![Action::ToggleSection(0), Action::ToggleSection(1)]
        );
    }

    #[test]
    fn visible_section_lists_blocks_and_load_more() {
        let source = source();
        let mut cache = PostCache::new();
        let mut feeds = feeds();
        let now = Instant::now();
        let plan = feeds[0].toggle(now, &mut cache).unwrap().unwrap();
        feeds[0].finish_load(plan.execute(&source), &mut cache);

        let rows = build_rows(&feeds, 80);
        let acts = actions(&rows);
        assert_eq!(acts[0], Action::ToggleSection(0));
        assert!(acts.contains(&Action::ToggleBody { feed: 0, block: 0 }));
        assert!(acts.contains(&Action::ToggleComments {
            feed: 0,
            block: 0,
            path: vec![]
        }));
        assert!(acts.contains(&Action::LoadMore(0)));
        assert_eq!(acts.last(), Some(&Action::ToggleSection(1)));

        let title = rows
            .iter()
            .find(|row| row.link.is_some())
            .expect("title row");
        assert_eq!(title.link.as_deref(), Some("https://www.example.com/post"));
        let rendered: String = title
            .line
            .spans
            .iter()
            .map(|span| span.content.as_ref())
            .collect();
        assert_eq!(rendered, "  Story 1 (example.com)");
    }

    #[test]
    fn expanded_comments_expose_reply_controls() {
        let source = source();
        let mut cache = PostCache::new();
        let mut feeds = feeds();
        feeds[0]
            .load_blocking(&source, &mut cache, Instant::now())
            .unwrap();
        let request = feeds[0].toggle_comments(0, &[]).unwrap();
        let level = comments::load_comments(&source, request.item_id, 10);
        feeds[0].finish_comments(&request, level);

        let rows = build_rows(&feeds, 80);
        assert!(actions(&rows).contains(&Action::ToggleComments {
            feed: 0,
            block: 0,
            path: vec![0]
        }));
        assert!(rows.iter().any(|row| row
            .line
            .spans
            .iter()
            .any(|span| span.content.contains("Load 1 replies"))));
    }

    #[test]
    fn comment_without_text_shows_placeholder() {
        let source = source();
        let mut cache = PostCache::new();
        let mut feeds = feeds();
        feeds[0]
            .load_blocking(&source, &mut cache, Instant::now())
            .unwrap();
        let request = feeds[0].toggle_comments(0, &[]).unwrap();
        let level = comments::load_comments(&source, request.item_id, 10);
        feeds[0].finish_comments(&request, level);

        let rows = build_rows(&feeds, 80);
        let author = rows
            .iter()
            .position(|row| {
                row.line
                    .spans
                    .iter()
                    .any(|span| span.content.starts_with("      user10 - "))
            })
            .expect("comment author row");
        let body: String = rows[author + 1]
            .line
            .spans
            .iter()
            .map(|span| span.content.as_ref())
            .collect();
        assert_eq!(body, "      [deleted]");
    }

    #[test]
    fn selection_skips_plain_rows() {
        let mut model = model(feeds());
        model.rows = build_rows(&model.feeds, 80);
        model.rows.insert(1, Row::text("filler".into(), secondary()));
        model.selected = 0;
        model.move_selection(1);
        assert_eq!(model.selected, 2);
        model.move_selection(1);
        assert_eq!(model.selected, 2);
        model.select_edge(false);
        assert_eq!(model.selected, 0);
    }

    #[test]
    fn toggling_a_section_issues_a_load_and_applies_the_batch() {
        let mut model = model(feeds());
        model.selected = 0;
        model.activate(Instant::now());
        assert!(model.feeds[0].is_visible());
        assert!(model.feeds[0].is_loading());

        let response = model
            .response_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("feed batch");
        model.handle_async_response(response);
        assert_eq!(model.feeds[0].blocks().len(), 2);
        assert_eq!(model.status_message, "Stories: showing 2 items.");
    }

    #[test]
    fn quit_keys_end_the_loop() {
        let mut model = model(feeds());
        assert!(model.handle_key(KeyCode::Char('q')).unwrap());
        assert!(!model.handle_key(KeyCode::Char('x')).unwrap());
    }
}
