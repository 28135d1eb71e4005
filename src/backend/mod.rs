//! # Backend Adapters
//!
//! The two seams to the hosted platform: who the user is
//! ([`IdentityProvider`]) and where messages live ([`MessageStore`]).
//! Everything behind them (token lifecycle, storage, ordering, fan-out)
//! belongs to the platform.

pub mod firebase;
pub mod identity;
pub mod local;
pub mod store;
pub mod types;

pub use identity::{AuthError, IdentityProvider, SignInPrompt};
pub use local::{LocalIdentity, LocalPlatform, LocalStore};
pub use store::{MessageStore, Snapshot, StoreError, Subscription, SubscriptionHandle};
pub use types::{CreatedAt, DraftMessage, Message, SessionState, UserIdentity, WINDOW_SIZE};
