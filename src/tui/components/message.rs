use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, BorderType, Padding, Paragraph, Widget, Wrap};

use crate::backend::Message as ChatMessage;
use crate::tui::component::Component;

/// Horizontal padding (per side) between the border and text content.
const CONTENT_PAD_H: u16 = 1;
/// Total horizontal space consumed by borders (1 left + 1 right) and padding.
const HORIZONTAL_OVERHEAD: u16 = 2 + CONTENT_PAD_H * 2;
/// Total vertical space consumed by borders (1 top + 1 bottom).
const VERTICAL_OVERHEAD: u16 = 2;
/// Text rows shown per message. Longer messages are cut off with a marker
/// so the window canvas stays within `u16` rows.
pub const MAX_MESSAGE_ROWS: usize = 200;

/// A stateless component that renders one chat message.
///
/// # Design
///
/// `Message` is a **transient component**: it is created fresh each frame by
/// the parent `MessageList` with the data it needs. It holds no state.
///
/// # Styling
///
/// - **Sent** (green, title on the right): authored by the signed-in user
/// - **Received** (blue, title on the left): everyone else
///
/// The top border carries `"<name> says:"` and the local time of the message,
/// or `sending…` while the store has not assigned a timestamp yet.
#[derive(Clone, Copy)]
pub struct Message<'a> {
    pub message: &'a ChatMessage,
    /// Whether the signed-in user wrote this message
    pub is_own: bool,
}

impl<'a> Message<'a> {
    pub fn new(message: &'a ChatMessage, is_own: bool) -> Self {
        Self { message, is_own }
    }

    /// Calculate the height required for this message given a width.
    ///
    /// `textwrap` predicts the wrapped line count without rendering, using
    /// options that match `Paragraph`'s wrapping, so the parent can size the
    /// scroll canvas up front. Capped at [`MAX_MESSAGE_ROWS`] text rows.
    pub fn calculate_height(message: &ChatMessage, width: u16) -> u16 {
        let content_width = width.saturating_sub(HORIZONTAL_OVERHEAD);
        if content_width == 0 {
            // Terminal too narrow for borders + padding
            return 1;
        }

        let rows = Self::wrapped_rows(message, content_width);
        if rows == 0 {
            return VERTICAL_OVERHEAD;
        }
        rows.min(MAX_MESSAGE_ROWS) as u16 + VERTICAL_OVERHEAD
    }

    /// Number of wrapped text rows before any cap.
    fn wrapped_rows(message: &ChatMessage, content_width: u16) -> usize {
        let content = message.text.trim();
        if content.is_empty() || content_width == 0 {
            return 0;
        }

        let options = textwrap::Options::new(content_width as usize)
            .break_words(true)
            .word_separator(textwrap::WordSeparator::AsciiSpace);

        textwrap::wrap(content, options).len().max(1)
    }

    fn style(&self) -> Style {
        if self.is_own {
            Style::default().fg(Color::Green)
        } else {
            Style::default().fg(Color::Blue)
        }
    }
}

impl<'a> Widget for Message<'a> {
    fn render(self, area: Rect, buf: &mut ratatui::buffer::Buffer) {
        let style = self.style();
        let border_style = style.add_modifier(Modifier::DIM);

        let author = Line::from(format!("{} says:", self.message.author_display_name));
        let mut time_style = Style::default().fg(Color::DarkGray);
        if self.message.created_at.is_pending() {
            time_style = time_style.add_modifier(Modifier::ITALIC);
        }
        let time = Line::styled(self.message.created_at.display(), time_style);

        // Sent messages mirror the received layout: name right, time left
        let (author, time) = if self.is_own {
            (author.right_aligned(), time.left_aligned())
        } else {
            (author.left_aligned(), time.right_aligned())
        };

        let mut block = Block::bordered()
            .border_type(BorderType::Rounded)
            .border_style(border_style)
            .title_style(style)
            .title_top(author)
            .title_top(time)
            .padding(Padding::horizontal(CONTENT_PAD_H));

        let rows = Self::wrapped_rows(
            self.message,
            area.width.saturating_sub(HORIZONTAL_OVERHEAD),
        );
        if rows > MAX_MESSAGE_ROWS {
            let hidden = rows - MAX_MESSAGE_ROWS;
            block = block.title_bottom(
                Line::styled(
                    format!("… {hidden} more lines"),
                    Style::default().fg(Color::DarkGray),
                )
                .centered(),
            );
        }

        let inner_area = block.inner(area);
        block.render(area, buf);

        let paragraph = Paragraph::new(self.message.text.trim())
            .wrap(Wrap { trim: true });
        paragraph.render(inner_area, buf);
    }
}

impl<'a> Component for Message<'a> {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        frame.render_widget(*self, area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CreatedAt;
    use chrono::{TimeZone, Utc};
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    fn make_message(text: &str, created_at: CreatedAt) -> ChatMessage {
        ChatMessage {
            id: "m1".to_string(),
            text: text.to_string(),
            author_id: "u2".to_string(),
            author_display_name: "Bob".to_string(),
            author_avatar_url: None,
            created_at,
        }
    }

    fn render_text(message: &ChatMessage, is_own: bool, width: u16) -> String {
        let height = Message::calculate_height(message, width);
        let backend = TestBackend::new(width, height);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal
            .draw(|f| {
                f.render_widget(Message::new(message, is_own), f.area());
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

    // ==========================================================================
    // calculate_height tests
    // ==========================================================================

    #[test]
    fn calculate_height_whitespace_only_treated_as_empty() {
        let message = make_message("   \n\t  ", CreatedAt::Pending);
        assert_eq!(Message::calculate_height(&message, 80), VERTICAL_OVERHEAD);
    }

    #[test]
    fn calculate_height_width_equals_overhead_returns_minimum() {
        let message = make_message("Hello world", CreatedAt::Pending);
        assert_eq!(Message::calculate_height(&message, HORIZONTAL_OVERHEAD), 1);
    }

    #[test]
    fn calculate_height_wraps_at_width_boundary() {
        let message = make_message("Hello world", CreatedAt::Pending);
        // width 9 → content_width 5: "Hello" | "world"
        assert_eq!(
            Message::calculate_height(&message, 9),
            2 + VERTICAL_OVERHEAD
        );
    }

    #[test]
    fn calculate_height_caps_very_long_messages() {
        let message = make_message(&"x\n".repeat(70_000), CreatedAt::Pending);
        assert_eq!(
            Message::calculate_height(&message, 80),
            MAX_MESSAGE_ROWS as u16 + VERTICAL_OVERHEAD
        );
    }

    #[test]
    fn calculate_height_counts_explicit_newlines() {
        let message = make_message("one\ntwo\nthree", CreatedAt::Pending);
        assert_eq!(
            Message::calculate_height(&message, 80),
            3 + VERTICAL_OVERHEAD
        );
    }

    // ==========================================================================
    // Rendering
    // ==========================================================================

    #[test]
    fn received_message_shows_author_and_text() {
        let at = CreatedAt::At(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
        let message = make_message("hi there", at);
        let text = render_text(&message, false, 60);

        assert!(text.contains("Bob says:"));
        assert!(text.contains("hi there"));
        assert!(text.contains(&at.display()));
    }

    #[test]
    fn pending_message_shows_placeholder_time() {
        let message = make_message("hello", CreatedAt::Pending);
        let text = render_text(&message, true, 60);
        assert!(text.contains("sending…"));
    }

    #[test]
    fn truncated_message_reports_hidden_lines() {
        let message = make_message(&"x\n".repeat(MAX_MESSAGE_ROWS + 5), CreatedAt::Pending);
        let text = render_text(&message, false, 60);
        assert!(text.contains("… 5 more lines"));
    }

    #[test]
    fn sent_and_received_use_different_colors() {
        let message = make_message("hello", CreatedAt::Pending);
        assert_eq!(Message::new(&message, true).style().fg, Some(Color::Green));
        assert_eq!(Message::new(&message, false).style().fg, Some(Color::Blue));
    }
}
