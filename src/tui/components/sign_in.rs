//! # Sign-In Page Component
//!
//! Full-screen view shown while no user is signed in: the app name, the
//! sign-in prompt, device code instructions while a sign-in is waiting for
//! approval, and the outcome of the last attempt.

use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Flex, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Paragraph, Wrap};

use crate::core::state::SignInState;
use crate::tui::component::Component;

/// What the page is showing.
pub enum SignInView<'a> {
    /// Cached credentials are still being checked
    Restoring,
    Ready(&'a SignInState),
}

pub struct SignInPage<'a> {
    /// Identity provider name, e.g. `firebase`
    pub provider: &'a str,
    pub view: SignInView<'a>,
}

impl<'a> SignInPage<'a> {
    pub fn new(provider: &'a str, view: SignInView<'a>) -> Self {
        Self { provider, view }
    }

    fn lines(&self) -> Vec<Line<'static>> {
        let dim = Style::default().fg(Color::DarkGray);
        let mut lines = vec![
            Line::from(Span::styled(
                "LiveChat",
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(format!("v{}", env!("CARGO_PKG_VERSION")), dim)),
            Line::default(),
        ];

        let state = match self.view {
            SignInView::Restoring => {
                lines.push(Line::from(Span::styled("Restoring session…", dim)));
                return lines;
            }
            SignInView::Ready(state) => state,
        };

        match (&state.prompt, state.signing_in) {
            (Some(prompt), _) => {
                lines.push(Line::from("To sign in, open"));
                lines.push(Line::from(Span::styled(
                    prompt.verification_url.clone(),
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::UNDERLINED),
                )));
                lines.push(Line::from(vec![
                    Span::raw("and enter the code "),
                    Span::styled(
                        prompt.user_code.clone(),
                        Style::default().add_modifier(Modifier::BOLD),
                    ),
                ]));
                lines.push(Line::from(Span::styled("Waiting for approval…", dim)));
            }
            (None, true) => {
                lines.push(Line::from(Span::styled(
                    format!("Contacting {}…", self.provider),
                    dim,
                )));
            }
            (None, false) => {
                lines.push(Line::from(vec![
                    Span::raw("Press "),
                    Span::styled("Enter", Style::default().add_modifier(Modifier::BOLD)),
                    Span::raw(format!(" to sign in with {}", self.provider)),
                ]));
                lines.push(Line::from(Span::styled("Esc to quit", dim)));
            }
        }

        if let Some(notice) = &state.notice {
            lines.push(Line::default());
            lines.push(Line::from(Span::styled(
                notice.clone(),
                Style::default().fg(Color::Yellow),
            )));
        }
        if let Some(error) = &state.error {
            lines.push(Line::default());
            lines.push(Line::from(Span::styled(
                error.clone(),
                Style::default().fg(Color::Red),
            )));
        }
        lines
    }
}

impl<'a> Component for SignInPage<'a> {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let lines = self.lines();
        let [text_area] = Layout::vertical([Constraint::Length(lines.len() as u16)])
            .flex(Flex::Center)
            .areas(area);

        let paragraph = Paragraph::new(lines)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, text_area);
    }
}
