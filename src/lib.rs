//! LiveChat library exports for testing

use clap::ValueEnum;

pub mod backend;
pub mod core;
pub mod logging;
pub mod tui;

#[cfg(test)]
pub mod test_support;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Firebase Authentication + Cloud Firestore
    Firebase,
    /// In-process store, single user (offline demo)
    Local,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Firebase => "firebase",
            Backend::Local => "local",
        }
    }
}
