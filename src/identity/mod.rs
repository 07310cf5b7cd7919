//! Identity resolution.
//!
//! [`IdentityResolver`] is the async trait that turns an identity token (an
//! email address) into an athlete [`Identity`]. [`RosterResolver`] implements
//! it over a JSON roster file.

mod roster;

pub use roster::{RosterEntry, RosterResolver};

use anyhow::Result;

use crate::types::Identity;

/// Looks up the athlete account behind an identity token.
///
/// `Ok(None)` means the lookup worked and no athlete matches; `Err` means the
/// lookup itself failed.
#[async_trait::async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, token: &str) -> Result<Option<Identity>>;
}
