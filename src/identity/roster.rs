use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use super::IdentityResolver;
use crate::types::Identity;

const ATHLETE_ROLE: &str = "athlete";

#[derive(Debug, Clone, Deserialize)]
pub struct RosterEntry {
    pub id: String,
    pub name: String,
    pub role: String,
}

/// Resolves athletes from a roster keyed by email.
///
/// Stored as a plain JSON object on disk:
/// ```json
/// {
///   "athlete@test.com": { "id": "1", "name": "John Smith", "role": "athlete" },
///   "coach@test.com": { "id": "2", "name": "Coach Johnson", "role": "coach" }
/// }
/// ```
/// Only entries with the `athlete` role resolve.
pub struct RosterResolver {
    entries: HashMap<String, RosterEntry>,
}

impl RosterResolver {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read roster {}", path.display()))?;
        let entries: HashMap<String, RosterEntry> = serde_json::from_str(&content)
            .with_context(|| format!("invalid roster {}", path.display()))?;
        Ok(Self { entries })
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (String, RosterEntry)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }
}

#[async_trait::async_trait]
impl IdentityResolver for RosterResolver {
    async fn resolve(&self, token: &str) -> Result<Option<Identity>> {
        let email = token.trim();
        Ok(self
            .entries
            .get(email)
            .filter(|e| e.role == ATHLETE_ROLE)
            .map(|e| Identity {
                account_id: e.id.clone(),
                name: e.name.clone(),
                email: email.to_string(),
            }))
    }
}
