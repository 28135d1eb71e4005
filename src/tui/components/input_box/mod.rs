//! # InputBox Component
//!
//! The composer: owns the local draft and turns Enter into a submit.
//!
//! ## Responsibilities
//!
//! - Capture text input (typing, paste, Ctrl+J for a newline)
//! - Handle editing (backspace, delete, cursor movement)
//! - Refuse submitting a blank draft
//! - Show the outcome of the last send in the title
//! - Take back a draft that was never persisted (`restore_draft`)
//!
//! ## State Management
//!
//! The buffer and cursor are internal state. Whether the chat is open and the
//! send status are props from the application state.

mod layout;

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, BorderType, Padding, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState,
};

use crate::core::state::SendStatus;
use crate::tui::component::{Component, EventHandler};
use crate::tui::event::TuiEvent;

use layout::{
    MAX_VISIBLE_ROWS, TEXT_OFFSET_X, VERTICAL_OVERHEAD, locate, next_boundary, prev_boundary,
    rows, text_width,
};

/// High-level events emitted by the InputBox
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    /// User submitted a non-blank draft (Enter pressed)
    Submit(String),
    ContentChanged,
}

/// Draft editor for the chat room.
///
/// # Props
///
/// - `enabled`: the chat room is open; a disabled box ignores input
/// - `status`: outcome of the last send
pub struct InputBox {
    /// Draft text (Internal State)
    pub buffer: String,
    pub enabled: bool,
    pub status: SendStatus,
    /// Cursor position as byte offset in buffer
    pos: usize,
    /// First visible row when the draft is taller than the box
    scroll: u16,
}

impl Default for InputBox {
    fn default() -> Self {
        Self::new()
    }
}

impl InputBox {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            enabled: true,
            status: SendStatus::Idle,
            pos: 0,
            scroll: 0,
        }
    }

    /// Submit is only possible with something other than whitespace.
    pub fn can_submit(&self) -> bool {
        !self.buffer.trim().is_empty()
    }

    /// Put text that failed to send back into the draft. Text typed since the
    /// submit stays, below the restored text.
    pub fn restore_draft(&mut self, text: &str) {
        if self.buffer.trim().is_empty() {
            self.buffer = text.to_string();
            self.pos = self.buffer.len();
        } else {
            self.buffer = format!("{text}\n{}", self.buffer);
            self.pos += text.len() + 1;
        }
    }

    /// Drop the draft (e.g. after signing out).
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.pos = 0;
        self.scroll = 0;
    }

    /// Height needed for the current draft, between 1 and
    /// `MAX_VISIBLE_ROWS` text rows plus borders.
    pub fn calculate_height(&self, area_width: u16) -> u16 {
        let count = rows(&self.buffer, text_width(area_width)).len() as u16;
        count.clamp(1, MAX_VISIBLE_ROWS) + VERTICAL_OVERHEAD
    }

    fn title(&self) -> Line<'static> {
        let status = match &self.status {
            SendStatus::Idle => None,
            SendStatus::Pending { .. } => Some(Span::styled(
                " · sending…",
                Style::default().fg(Color::DarkGray),
            )),
            SendStatus::Succeeded => Some(Span::styled(
                " · sent ✓",
                Style::default().fg(Color::Green),
            )),
            SendStatus::Failed { error, .. } => Some(Span::styled(
                format!(" · ✗ {error}"),
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            )),
        };
        let mut spans = vec![Span::raw("Message")];
        spans.extend(status);
        Line::from(spans)
    }

    fn render_scrollbar(&self, frame: &mut Frame, area: Rect, total_rows: u16) {
        if total_rows <= MAX_VISIBLE_ROWS {
            return;
        }
        let mut scrollbar_state = ScrollbarState::default()
            .content_length(usize::from(total_rows - MAX_VISIBLE_ROWS))
            .position(usize::from(self.scroll));
        let scrollbar_area = Rect {
            x: area.x + area.width.saturating_sub(1),
            y: area.y + 1,
            width: 1,
            height: area.height.saturating_sub(2),
        };
        frame.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight),
            scrollbar_area,
            &mut scrollbar_state,
        );
    }
}

impl Component for InputBox {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let width = text_width(area.width);
        let layout = rows(&self.buffer, width);
        let total_rows = layout.len() as u16;
        let (cursor_row, cursor_col) = locate(&self.buffer, &layout, self.pos);
        // Spaces kept at a break can push the cursor past the text column
        let cursor_col = cursor_col.min(width);

        // Keep the cursor row inside the visible window
        if cursor_row < self.scroll {
            self.scroll = cursor_row;
        } else if cursor_row >= self.scroll + MAX_VISIBLE_ROWS {
            self.scroll = cursor_row + 1 - MAX_VISIBLE_ROWS;
        }
        if total_rows <= MAX_VISIBLE_ROWS {
            self.scroll = 0;
        }

        // Dim border while there is nothing to send
        let border_style = if self.enabled && self.can_submit() {
            Style::default().fg(Color::Green)
        } else {
            Style::default().fg(Color::Green).add_modifier(Modifier::DIM)
        };
        let block = Block::bordered()
            .border_type(BorderType::Rounded)
            .border_style(border_style)
            .title(self.title())
            .title_bottom(Line::from("Enter send · Ctrl+J newline").right_aligned())
            .padding(Padding::horizontal(1));

        let body: Vec<Line> = if self.buffer.is_empty() {
            let hint = if self.enabled {
                "Type a message…"
            } else {
                "Sign in to chat"
            };
            vec![Line::styled(hint, Style::default().fg(Color::DarkGray))]
        } else {
            layout
                .iter()
                .skip(usize::from(self.scroll))
                .take(usize::from(MAX_VISIBLE_ROWS))
                .map(|r| Line::raw(self.buffer[r.clone()].to_string()))
                .collect()
        };

        frame.render_widget(Paragraph::new(body).block(block), area);
        self.render_scrollbar(frame, area, total_rows);

        if self.enabled {
            frame.set_cursor_position((
                area.x + TEXT_OFFSET_X + cursor_col,
                area.y + 1 + cursor_row - self.scroll,
            ));
        }
    }
}

impl EventHandler for InputBox {
    type Event = InputEvent;

    fn handle_event(&mut self, event: &TuiEvent) -> Option<Self::Event> {
        if !self.enabled {
            return None;
        }
        match event {
            TuiEvent::InputChar(c) => {
                self.buffer.insert(self.pos, *c);
                self.pos += c.len_utf8();
                Some(InputEvent::ContentChanged)
            }
            TuiEvent::Paste(text) => {
                // Terminals send CRLF for pasted line breaks
                let text = text.replace("\r\n", "\n").replace('\r', "\n");
                self.buffer.insert_str(self.pos, &text);
                self.pos += text.len();
                Some(InputEvent::ContentChanged)
            }
            TuiEvent::Backspace => (self.pos > 0).then(|| {
                let prev = prev_boundary(&self.buffer, self.pos);
                self.buffer.drain(prev..self.pos);
                self.pos = prev;
                InputEvent::ContentChanged
            }),
            TuiEvent::Delete => (self.pos < self.buffer.len()).then(|| {
                let next = next_boundary(&self.buffer, self.pos);
                self.buffer.drain(self.pos..next);
                InputEvent::ContentChanged
            }),
            TuiEvent::CursorLeft => (self.pos > 0).then(|| {
                self.pos = prev_boundary(&self.buffer, self.pos);
                InputEvent::ContentChanged
            }),
            TuiEvent::CursorRight => (self.pos < self.buffer.len()).then(|| {
                self.pos = next_boundary(&self.buffer, self.pos);
                InputEvent::ContentChanged
            }),
            TuiEvent::CursorHome => {
                let line_start = self.buffer[..self.pos].rfind('\n').map_or(0, |i| i + 1);
                (self.pos != line_start).then(|| {
                    self.pos = line_start;
                    InputEvent::ContentChanged
                })
            }
            TuiEvent::CursorEnd => {
                let line_end = self.buffer[self.pos..]
                    .find('\n')
                    .map_or(self.buffer.len(), |i| self.pos + i);
                (self.pos != line_end).then(|| {
                    self.pos = line_end;
                    InputEvent::ContentChanged
                })
            }
            TuiEvent::Submit => self.can_submit().then(|| {
                let text = std::mem::take(&mut self.buffer);
                self.pos = 0;
                self.scroll = 0;
                InputEvent::Submit(text)
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    fn type_text(input: &mut InputBox, text: &str) {
        for c in text.chars() {
            input.handle_event(&TuiEvent::InputChar(c));
        }
    }

    fn render_text(input: &mut InputBox, width: u16) -> String {
        let height = input.calculate_height(width);
        let backend = TestBackend::new(width, height);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal
            .draw(|f| {
                input.render(f, f.area());
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
    fn test_input_box_new() {
        let input = InputBox::new();
        assert!(input.buffer.is_empty());
        assert!(input.enabled);
        assert!(!input.can_submit());
    }

    #[test]
    fn test_handle_input() {
        let mut input = InputBox::new();

        let res = input.handle_event(&TuiEvent::InputChar('a'));
        assert_eq!(res, Some(InputEvent::ContentChanged));
        type_text(&mut input, "bé");
        assert_eq!(input.buffer, "abé");

        let res = input.handle_event(&TuiEvent::Backspace);
        assert_eq!(res, Some(InputEvent::ContentChanged));
        assert_eq!(input.buffer, "ab");

        input.handle_event(&TuiEvent::CursorHome);
        input.handle_event(&TuiEvent::Delete);
        assert_eq!(input.buffer, "b");
    }

    #[test]
    fn test_submit_clears_draft() {
        let mut input = InputBox::new();
        type_text(&mut input, "hello");

        let res = input.handle_event(&TuiEvent::Submit);
        assert_eq!(res, Some(InputEvent::Submit("hello".to_string())));
        assert!(input.buffer.is_empty(), "Buffer should be cleared after submit");
    }

    #[test]
    fn test_blank_draft_is_not_submitted() {
        let mut input = InputBox::new();
        assert_eq!(input.handle_event(&TuiEvent::Submit), None);

        type_text(&mut input, "  ");
        input.handle_event(&TuiEvent::InputChar('\n'));
        assert_eq!(input.handle_event(&TuiEvent::Submit), None);
        assert_eq!(input.buffer, "  \n", "Blank draft is left as typed");
    }

    #[test]
    fn test_disabled_box_ignores_input() {
        let mut input = InputBox::new();
        input.enabled = false;
        assert_eq!(input.handle_event(&TuiEvent::InputChar('a')), None);
        assert!(input.buffer.is_empty());
    }

    #[test]
    fn test_paste_normalizes_line_endings() {
        let mut input = InputBox::new();
        input.handle_event(&TuiEvent::Paste("one\r\ntwo".to_string()));
        assert_eq!(input.buffer, "one\ntwo");
    }

    #[test]
    fn test_restore_into_empty_draft() {
        let mut input = InputBox::new();
        input.restore_draft("hello");
        assert_eq!(input.buffer, "hello");

        // Cursor is at the end: typing appends
        type_text(&mut input, "!");
        assert_eq!(input.buffer, "hello!");
    }

    #[test]
    fn test_restore_keeps_new_draft_below() {
        let mut input = InputBox::new();
        type_text(&mut input, "second");
        input.restore_draft("first");
        assert_eq!(input.buffer, "first\nsecond");

        // Cursor stays where the user was typing
        type_text(&mut input, "!");
        assert_eq!(input.buffer, "first\nsecond!");
    }

    #[test]
    fn test_height_grows_then_caps() {
        let mut input = InputBox::new();
        assert_eq!(input.calculate_height(40), 1 + VERTICAL_OVERHEAD);
        input.restore_draft("1\n2\n3");
        assert_eq!(input.calculate_height(40), 3 + VERTICAL_OVERHEAD);
        input.restore_draft("a\nb\nc\nd\ne\nf");
        assert_eq!(
            input.calculate_height(40),
            MAX_VISIBLE_ROWS + VERTICAL_OVERHEAD
        );
    }

    #[test]
    fn test_render_shows_failed_send() {
        let mut input = InputBox::new();
        input.restore_draft("hello");
        input.status = SendStatus::Failed {
            text: "hello".into(),
            error: "message not sent: offline".into(),
        };
        let text = render_text(&mut input, 80);
        assert!(text.contains("message not sent: offline"));
        assert!(text.contains("hello"));
    }

    #[test]
    fn test_render_placeholder_when_empty() {
        let mut input = InputBox::new();
        let text = render_text(&mut input, 60);
        assert!(text.contains("Type a message…"));

        input.enabled = false;
        let text = render_text(&mut input, 60);
        assert!(text.contains("Sign in to chat"));
    }
}
