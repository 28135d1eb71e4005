//! # MessageList Component
//!
//! Scrollable view of the message window.
//!
//! ## Responsibilities
//!
//! - Display the window oldest-first, newest at the bottom
//! - Follow the newest message unless the user scrolled up
//! - Flag unseen messages for the title bar's "↓ New" indicator
//! - Show the waiting and degraded states of the live query
//! - Cache message heights by message id
//!
//! ## Architecture
//!
//! `MessageList` is a transient component (created each frame) that wraps
//! `&'a mut MessageListState` (persistent state) and the current `Feed` (props).
//!
//! Since `Component::render` takes `&mut self`, the layout cache and scroll
//! state are updated during the render pass, aligning with Ratatui's
//! `StatefulWidget` pattern.

use std::collections::HashMap;

use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Layout, Position, Rect, Size};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Paragraph, Wrap};
use tui_scrollview::{ScrollView, ScrollViewState, ScrollbarVisibility};

use crate::backend::Message as ChatMessage;
use crate::core::state::Feed;
use crate::tui::component::{Component, EventHandler};
use crate::tui::components::message::Message;
use crate::tui::event::TuiEvent;

/// Layout and scroll state for the message list.
/// Must be persisted in the parent TuiState.
pub struct MessageListState {
    /// Scroll offset and view state
    pub scroll_state: ScrollViewState,
    /// Cached layout measurements
    pub layout: LayoutCache,
    /// When true, auto-scroll to bottom on new content
    pub stick_to_bottom: bool,
    /// A snapshot brought messages the user has not scrolled down to yet
    pub has_unseen_content: bool,
    /// Newest message id seen at the last render
    last_newest_id: Option<String>,
    /// Last known viewport height (for scroll clamping between frames)
    pub viewport_height: u16,
}

impl Default for MessageListState {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageListState {
    pub fn new() -> Self {
        Self {
            scroll_state: ScrollViewState::default(),
            layout: LayoutCache::new(),
            stick_to_bottom: true, // Start attached to bottom
            has_unseen_content: false,
            last_newest_id: None,
            viewport_height: 0,
        }
    }

    fn max_offset(&self) -> u16 {
        self.layout.total_height().saturating_sub(self.viewport_height)
    }

    /// Clamp scroll offset so it never exceeds the content bounds.
    pub fn clamp_scroll(&mut self) {
        let max_y = self.max_offset();
        let current = self.scroll_state.offset();
        if current.y > max_y {
            self.scroll_state.set_offset(Position {
                x: current.x,
                y: max_y,
            });
        }
    }

    /// Clamp scroll and re-engage auto-scroll if the user has reached the bottom.
    pub fn repin_if_at_bottom(&mut self) {
        let max_y = self.max_offset();
        let current = self.scroll_state.offset();
        if current.y >= max_y {
            self.scroll_to_bottom();
        }
    }

    pub fn scroll_to_bottom(&mut self) {
        self.stick_to_bottom = true;
        self.has_unseen_content = false;
        self.scroll_state.scroll_to_bottom();
    }

    /// Record the newest message of this frame; raises the unseen flag when
    /// it changed while the user is scrolled up.
    fn observe_newest(&mut self, newest: Option<&ChatMessage>) {
        let newest_id = newest.map(|m| m.id.as_str());
        if self.last_newest_id.as_deref() != newest_id {
            if !self.stick_to_bottom && newest_id.is_some() {
                self.has_unseen_content = true;
            }
            self.last_newest_id = newest_id.map(str::to_string);
        }
    }
}

/// Scrollable message window component.
/// Created fresh each frame with references to state and data.
pub struct MessageList<'a> {
    pub state: &'a mut MessageListState,
    pub feed: &'a Feed,
    /// Id of the signed-in user, to tell sent from received messages
    pub own_id: &'a str,
}

impl<'a> MessageList<'a> {
    pub fn new(state: &'a mut MessageListState, feed: &'a Feed, own_id: &'a str) -> Self {
        Self {
            state,
            feed,
            own_id,
        }
    }

    fn render_placeholder(frame: &mut Frame, area: Rect, text: &str) {
        let [_, middle, _] = Layout::vertical([
            Constraint::Fill(1),
            Constraint::Length(1),
            Constraint::Fill(1),
        ])
        .areas(area);
        let paragraph = Paragraph::new(text)
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(paragraph, middle);
    }

    fn render_messages(&mut self, frame: &mut Frame, area: Rect, messages: &[ChatMessage]) {
        let content_width = area.width.saturating_sub(1); // -1 for scrollbar safe area

        // 1. Update Layout Cache (Internal Mutation)
        self.state.layout.update(messages, content_width);
        let total_height = self.state.layout.total_height();

        // 2. Clamp scroll offset to prevent overscrolling past content
        self.state.viewport_height = area.height;
        self.state.observe_newest(messages.last());
        if self.state.stick_to_bottom {
            // Pin before picking the visible range so the first frame lands on the newest
            let bottom = self.state.max_offset();
            self.state.scroll_state.set_offset(Position { x: 0, y: bottom });
        } else {
            self.state.clamp_scroll();
        }

        let scroll_offset = self.state.scroll_state.offset().y;
        let visible_range = self.state.layout.visible_range(scroll_offset, area.height);

        // 3. Render visible messages into a ScrollView
        let mut scroll_view = ScrollView::new(Size::new(content_width, total_height))
            .vertical_scrollbar_visibility(ScrollbarVisibility::Always)
            .horizontal_scrollbar_visibility(ScrollbarVisibility::Never);

        let mut y_offset: u16 = if visible_range.start > 0 {
            self.state.layout.prefix_heights[visible_range.start - 1]
        } else {
            0
        };

        for i in visible_range {
            let message = &messages[i];
            let height = self.state.layout.heights[i];
            let rect = Rect::new(0, y_offset, content_width, height);
            let is_own = message.author_id == self.own_id;
            scroll_view.render_widget(Message::new(message, is_own), rect);
            y_offset = y_offset.saturating_add(height);
        }

        frame.render_stateful_widget(scroll_view, area, &mut self.state.scroll_state);

        // Reaching the bottom by any means clears the indicator
        if self.state.scroll_state.offset().y >= self.state.max_offset() {
            self.state.has_unseen_content = false;
        }
    }
}

impl<'a> Component for MessageList<'a> {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let feed = self.feed;
        match feed {
            Feed::Waiting => Self::render_placeholder(frame, area, "Loading messages…"),
            Feed::Live(messages) if messages.is_empty() => {
                self.state.observe_newest(None);
                Self::render_placeholder(frame, area, "No messages yet. Say hello!");
            }
            Feed::Live(messages) => self.render_messages(frame, area, messages),
            Feed::Degraded { last, error } => {
                // Error banner on top, last good window below
                let banner = Paragraph::new(format!("⚠ {error} (showing the last messages received)"))
                    .style(
                        Style::default()
                            .fg(Color::Red)
                            .add_modifier(Modifier::BOLD),
                    )
                    .wrap(Wrap { trim: true });
                let banner_height = (banner.line_count(area.width) as u16).min(area.height);
                let [banner_area, list_area] = Layout::vertical([
                    Constraint::Length(banner_height),
                    Constraint::Min(0),
                ])
                .areas(area);
                frame.render_widget(banner, banner_area);
                if last.is_empty() {
                    Self::render_placeholder(frame, list_area, "Messages are unavailable.");
                } else {
                    self.render_messages(frame, list_area, last);
                }
            }
        }
    }
}

/// EventHandler is implemented on `MessageListState` rather than `MessageList`
/// because scrolling only touches persistent state.
impl EventHandler for MessageListState {
    type Event = ();

    fn handle_event(&mut self, event: &TuiEvent) -> Option<Self::Event> {
        match event {
            TuiEvent::ScrollUp => {
                self.scroll_state.scroll_up();
                self.stick_to_bottom = false;
            }
            TuiEvent::ScrollDown => {
                self.scroll_state.scroll_down();
                self.repin_if_at_bottom();
            }
            TuiEvent::ScrollPageUp => {
                self.scroll_state.scroll_page_up();
                self.stick_to_bottom = false;
            }
            TuiEvent::ScrollPageDown => {
                self.scroll_state.scroll_page_down();
                self.repin_if_at_bottom();
            }
            TuiEvent::ScrollToBottom => self.scroll_to_bottom(),
            _ => {}
        }
        None
    }
}

/// Cached layout measurements, keyed by message id.
///
/// Messages are immutable once stamped, so a height only changes with the
/// width or when a pending message receives its timestamp (same text, same
/// height). A window shift reuses every height still present.
pub struct LayoutCache {
    pub heights: Vec<u16>,
    pub prefix_heights: Vec<u16>,
    by_id: HashMap<String, u16>,
    content_width: u16,
}

impl Default for LayoutCache {
    fn default() -> Self {
        Self::new()
    }
}

impl LayoutCache {
    pub fn new() -> Self {
        Self {
            heights: Vec::new(),
            prefix_heights: Vec::new(),
            by_id: HashMap::new(),
            content_width: 0,
        }
    }

    pub fn update(&mut self, messages: &[ChatMessage], content_width: u16) {
        if self.content_width != content_width {
            self.by_id.clear();
            self.content_width = content_width;
        }

        let mut by_id = HashMap::with_capacity(messages.len());
        self.heights = messages
            .iter()
            .map(|message| {
                let height = self
                    .by_id
                    .get(&message.id)
                    .copied()
                    .unwrap_or_else(|| Message::calculate_height(message, content_width));
                by_id.insert(message.id.clone(), height);
                height
            })
            .collect();
        // Drop entries for messages that left the window
        self.by_id = by_id;
        self.rebuild_prefix_heights();
    }

    pub fn total_height(&self) -> u16 {
        self.prefix_heights.last().copied().unwrap_or(0)
    }

    pub fn cached_ids(&self) -> usize {
        self.by_id.len()
    }

    pub fn rebuild_prefix_heights(&mut self) {
        self.prefix_heights = self
            .heights
            .iter()
            .scan(0u16, |acc, &h| {
                *acc = acc.saturating_add(h);
                Some(*acc)
            })
            .collect();
    }

    pub fn visible_range(
        &self,
        scroll_offset: u16,
        viewport_height: u16,
    ) -> std::ops::Range<usize> {
        let buffer = viewport_height / 2;
        let buffered_start = scroll_offset.saturating_sub(buffer);
        let buffered_end = scroll_offset
            .saturating_add(viewport_height)
            .saturating_add(buffer);

        let start = self
            .prefix_heights
            .partition_point(|&end| end <= buffered_start);
        let end = self
            .prefix_heights
            .partition_point(|&end| end < buffered_end)
            .saturating_add(1)
            .min(self.prefix_heights.len());

        start..end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CreatedAt;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    fn message(id: &str, author_id: &str, text: &str) -> ChatMessage {
        ChatMessage {
            id: id.to_string(),
            text: text.to_string(),
            author_id: author_id.to_string(),
            author_display_name: if author_id == "u1" { "Alice" } else { "Bob" }.to_string(),
            author_avatar_url: None,
            created_at: CreatedAt::Pending,
        }
    }

    fn window(count: usize) -> Vec<ChatMessage> {
        (0..count)
            .map(|i| message(&format!("m{i}"), "u2", &format!("message {i}")))
            .collect()
    }

    fn render_text(state: &mut MessageListState, feed: &Feed, width: u16, height: u16) -> String {
        let backend = TestBackend::new(width, height);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal
            .draw(|f| {
                MessageList::new(state, feed, "u1").render(f, f.area());
            })
            .unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect::<String>()
    }

    #[test]
    fn waiting_feed_shows_loading() {
        let mut state = MessageListState::new();
        let text = render_text(&mut state, &Feed::Waiting, 60, 10);
        assert!(text.contains("Loading messages…"));
    }

    #[test]
    fn empty_window_invites_first_message() {
        let mut state = MessageListState::new();
        let text = render_text(&mut state, &Feed::Live(Vec::new()), 60, 10);
        assert!(text.contains("No messages yet"));
    }

    #[test]
    fn degraded_feed_keeps_messages_under_error() {
        let mut state = MessageListState::new();
        let feed = Feed::Degraded {
            last: vec![message("a", "u2", "still here")],
            error: "live query failed: HTTP 403".to_string(),
        };
        let text = render_text(&mut state, &feed, 80, 10);
        assert!(text.contains("live query failed: HTTP 403"));
        assert!(text.contains("still here"));
        assert!(!text.contains("No messages yet"));
    }

    #[test]
    fn newest_message_is_visible_when_pinned() {
        let mut state = MessageListState::new();
        // 25 messages of height 3 in a 12-row viewport
        let feed = Feed::Live(window(25));
        let text = render_text(&mut state, &feed, 60, 12);
        assert!(text.contains("message 24"));
        assert!(!text.contains("message 0 "));
        assert!(state.stick_to_bottom);
        assert!(!state.has_unseen_content);
    }

    #[test]
    fn new_snapshot_while_scrolled_up_flags_unseen() {
        let mut state = MessageListState::new();
        render_text(&mut state, &Feed::Live(window(10)), 60, 12);

        state.handle_event(&TuiEvent::ScrollPageUp);
        assert!(!state.stick_to_bottom);

        // Same window again: nothing new
        render_text(&mut state, &Feed::Live(window(10)), 60, 12);
        assert!(!state.has_unseen_content);

        render_text(&mut state, &Feed::Live(window(11)), 60, 12);
        assert!(state.has_unseen_content);

        state.handle_event(&TuiEvent::ScrollToBottom);
        assert!(state.stick_to_bottom);
        assert!(!state.has_unseen_content);
    }

    #[test]
    fn layout_cache_keyed_by_id_drops_evicted_messages() {
        let mut cache = LayoutCache::new();
        cache.update(&window(25), 60);
        assert_eq!(cache.heights.len(), 25);
        assert_eq!(cache.total_height(), 25 * 3);

        // Window shifted by one: m0 evicted, m25 added
        let shifted: Vec<_> = (1..26)
            .map(|i| message(&format!("m{i}"), "u2", &format!("message {i}")))
            .collect();
        cache.update(&shifted, 60);
        assert_eq!(cache.heights.len(), 25);
        assert_eq!(cache.cached_ids(), 25);
    }

    #[test]
    fn layout_cache_invalidated_by_width() {
        let long = vec![message("a", "u2", "a fairly long message that wraps at narrow widths")];
        let mut cache = LayoutCache::new();
        cache.update(&long, 80);
        let wide = cache.total_height();
        cache.update(&long, 20);
        assert!(cache.total_height() > wide);
    }

    #[test]
    fn window_of_very_tall_messages_renders_newest() {
        let mut state = MessageListState::new();
        let tall: Vec<_> = (0..25)
            .map(|i| message(&format!("m{i}"), "u2", &format!("{}last {i}", "x\n".repeat(3000))))
            .collect();
        let text = render_text(&mut state, &Feed::Live(tall), 80, 24);

        assert!(text.contains("more lines"));
        let max_height = crate::tui::components::message::MAX_MESSAGE_ROWS as u16 + 2;
        assert_eq!(state.layout.total_height(), 25 * max_height);
    }

    #[test]
    fn prefix_heights_saturate_instead_of_wrapping() {
        let mut cache = LayoutCache::new();
        cache.heights = vec![u16::MAX / 2; 4];
        cache.rebuild_prefix_heights();
        assert_eq!(cache.total_height(), u16::MAX);
        assert!(cache.prefix_heights.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn visible_range_covers_viewport() {
        let mut cache = LayoutCache::new();
        cache.heights = vec![3; 10];
        cache.rebuild_prefix_heights();
        // Viewport rows 9..15 with a half-viewport buffer each side
        let range = cache.visible_range(9, 6);
        assert!(range.start <= 3);
        assert!(range.end >= 5);
        assert!(range.end <= 10);
    }
}
