//! # TUI Components
//!
//! All UI components for the terminal interface.
//!
//! ## Component Architecture
//!
//! Components follow two patterns:
//!
//! ### Stateless Components (Props-Based Rendering)
//!
//! Display components that receive all data as props and are rebuilt each frame:
//! - `TitleBar`: Top status bar with backend, user and notifications
//! - `Message`: One chat message, styled as sent or received
//! - `SignInPage`: The signed-out view with the sign-in prompt
//!
//! ### Stateful Components (Event-Driven)
//!
//! Components that keep local state and emit events:
//! - `InputBox`: The composer, owns the draft
//! - `MessageList`: Scrollable message window with layout caching
//!
//! ## Props-Based Data Flow
//!
//! Components receive external data as props (struct fields), never by
//! reaching into `App`. Dependencies stay explicit and components testable
//! with a `TestBackend`.
//!
//! ```rust,ignore
//! let mut title_bar = TitleBar::new(app.backend_label(), user, status, unseen);
//! title_bar.render(frame, area);
//! ```
//!
//! ## Module Structure
//!
//! ```text
//! components/
//! ├── mod.rs           (this file)
//! ├── title_bar.rs     (Top status bar)
//! ├── sign_in.rs       (Signed-out view)
//! ├── message.rs       (Single message renderer)
//! ├── message_list.rs  (Scrollable message window)
//! └── input_box/       (Composer)
//! ```

mod title_bar;
pub use title_bar::TitleBar;

pub mod input_box;
pub mod message;
pub use input_box::{InputBox, InputEvent};
pub mod message_list;
pub use message_list::{MessageList, MessageListState};
pub mod sign_in;
pub use sign_in::{SignInPage, SignInView};
