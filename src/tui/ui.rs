use ratatui::Frame;
use ratatui::layout::{Constraint, Layout};

use crate::core::state::{App, Gate};
use crate::tui::TuiState;
use crate::tui::component::Component;
use crate::tui::components::{MessageList, SignInPage, SignInView, TitleBar};

/// Draw one frame: title bar on top, then the view selected by the session gate.
pub fn draw_ui(frame: &mut Frame, app: &App, tui: &mut TuiState) {
    use Constraint::{Length, Min};

    let room = app.gate.room();
    tui.input_box.enabled = room.is_some();
    tui.input_box.status = app.send.clone();

    let input_height = if room.is_some() {
        tui.input_box.calculate_height(frame.area().width)
    } else {
        0
    };
    let [title_area, main_area, input_area] =
        Layout::vertical([Length(1), Min(0), Length(input_height)]).areas(frame.area());

    let provider = app.identity.name();
    match &app.gate {
        Gate::Loading => {
            SignInPage::new(provider, SignInView::Restoring).render(frame, main_area);
        }
        Gate::Unauthenticated(sign_in) => {
            SignInPage::new(provider, SignInView::Ready(sign_in)).render(frame, main_area);
        }
        Gate::Authenticated(room) => {
            MessageList::new(&mut tui.message_list, &room.feed, &room.identity.id)
                .render(frame, main_area);
            tui.input_box.render(frame, input_area);
        }
    }

    // Drawn last so the unseen flag reflects this frame's list render
    TitleBar::new(
        app.backend_label(),
        room.map(|r| r.identity.display_name.clone()),
        app.status_message.clone(),
        room.is_some() && tui.message_list.has_unseen_content,
    )
    .render(frame, title_area);
}
