//! # Credential Cache
//!
//! Keeps the Firebase refresh token between runs in
//! `~/.livechat/credentials.json` so the app can resolve the session without
//! an interactive sign-in. Writes use atomic rename (write `.tmp`, then
//! `rename()`) so a crash never leaves a half-written token behind.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::backend::types::UserIdentity;

/// What survives a restart: who the user is and how to get a fresh ID token.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CachedCredentials {
    pub identity: UserIdentity,
    pub refresh_token: String,
}

/// Returns `~/.livechat/credentials.json`.
pub fn default_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".livechat").join("credentials.json"))
}

/// Loads cached credentials. A missing file is `Ok(None)`.
pub fn load(path: &Path) -> io::Result<Option<CachedCredentials>> {
    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    let creds = serde_json::from_str(&contents)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    debug!("Loaded cached credentials from {}", path.display());
    Ok(Some(creds))
}

pub fn save(path: &Path, creds: &CachedCredentials) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(creds)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    info!("Cached credentials for {}", creds.identity.display_name);
    Ok(())
}

/// Removes the cache. Already gone is fine.
pub fn clear(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
