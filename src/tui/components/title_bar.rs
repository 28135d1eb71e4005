//! # TitleBar Component
//!
//! Top status bar showing who is signed in, the backend in use and
//! transient notifications.
//!
//! ## Responsibilities
//!
//! - Display the app name and backend (`LiveChat (firebase/firestore)`)
//! - Display the signed-in user and the sign-out shortcut
//! - Display status messages (e.g. "Signing in…", "Sign-out failed: …")
//! - Show "↓ New" when a snapshot arrived below the scroll position
//!
//! ## Conditional Formatting
//!
//! Segments are joined with ` | ` and left out when empty:
//!
//! 1. **Signed in, unseen content**: `"LiveChat (local/local) | Alice · Ctrl+X sign out | Sent | ↓ New"`
//! 2. **Signed in**: `"LiveChat (local/local) | Alice · Ctrl+X sign out"`
//! 3. **Signed out**: `"LiveChat (local/local) | Sign-in cancelled."`
//!
//! The app name always comes first so it survives on narrow terminals.

use crate::tui::component::Component;
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

/// Top status bar component.
///
/// All fields are props:
/// - `backend_label`: e.g. `firebase/firestore`
/// - `user`: display name of the signed-in user, `None` outside the chat
/// - `status_message`: transient status from the core
/// - `has_unseen_content`: whether there are messages below the scroll position
pub struct TitleBar {
    pub backend_label: String,
    pub user: Option<String>,
    pub status_message: String,
    pub has_unseen_content: bool,
}

impl TitleBar {
    pub fn new(
        backend_label: String,
        user: Option<String>,
        status_message: String,
        has_unseen_content: bool,
    ) -> Self {
        Self {
            backend_label,
            user,
            status_message,
            has_unseen_content,
        }
    }

    fn title_text(&self) -> String {
        let mut segments = vec![format!("LiveChat ({})", self.backend_label)];
        if let Some(user) = &self.user {
            segments.push(format!("{user} · Ctrl+X sign out"));
        }
        if !self.status_message.is_empty() {
            segments.push(self.status_message.clone());
        }
        if self.has_unseen_content {
            segments.push("↓ New".to_string());
        }
        segments.join(" | ")
    }
}

impl Component for TitleBar {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let style = Style::default()
            .fg(Color::Black)
            .bg(Color::Cyan)
            .add_modifier(Modifier::BOLD);
        let line = Line::from(Span::styled(self.title_text(), style)).style(style);
        frame.render_widget(line, area);
    }
}
