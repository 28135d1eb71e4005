//! Test utilities shared across the crate.
//!
//! This module is only compiled during tests (`#[cfg(test)]`).

use std::sync::Arc;

use crate::backend::{LocalIdentity, LocalPlatform, UserIdentity, WINDOW_SIZE};
use crate::core::state::App;

pub fn alice() -> UserIdentity {
    UserIdentity {
        id: "u1".to_string(),
        display_name: "Alice".to_string(),
        avatar_url: None,
    }
}

pub fn bob() -> UserIdentity {
    UserIdentity {
        id: "u2".to_string(),
        display_name: "Bob".to_string(),
        avatar_url: None,
    }
}

/// Creates a test App for Alice on a fresh in-process platform.
/// The platform is returned so tests can inspect it or inject failures.
pub fn test_app() -> (App, LocalPlatform) {
    let platform = LocalPlatform::new();
    let app = App::new(
        Arc::new(LocalIdentity::new(alice())),
        Arc::new(platform.store()),
        WINDOW_SIZE,
    );
    (app, platform)
}
