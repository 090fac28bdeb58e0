//! Remote profile store contract.
//!
//! The backend owns the user profile. The client only reads it and sends
//! mutations by catalog position; it never computes fields into it.

use std::fmt;
use std::future::Future;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

/// Role chosen during onboarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UserRole {
    Traveller,
    Host,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Traveller => "traveller",
            UserRole::Host => "host",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "traveller" => Ok(UserRole::Traveller),
            "host" => Ok(UserRole::Host),
            other => Err(SyncError::Serialization {
                key: "user_role".to_string(),
                message: format!("unknown role '{}'", other),
            }),
        }
    }
}

/// Remote-owned user profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfileView {
    pub principal: String,
    pub display_name: String,
    pub role: UserRole,
    #[serde(default)]
    pub saved_favorites: Vec<u64>,
    #[serde(default)]
    pub past_explorations: Vec<u64>,
}

/// RPC-style client for the caller's profile.
///
/// Mutations are add-only at this boundary unless the store opts into
/// [`RemoteProfileStore::remove_favorite`].
pub trait RemoteProfileStore: Send + Sync {
    /// Profile of the signed-in caller, `None` if it has not been created.
    fn get_caller_user_profile(
        &self,
    ) -> impl Future<Output = Result<Option<UserProfileView>>> + Send;

    fn save_favorite(&self, index: u64) -> impl Future<Output = Result<()>> + Send;

    fn add_past_exploration(&self, index: u64) -> impl Future<Output = Result<()>> + Send;

    fn create_user_profile(
        &self,
        role: UserRole,
        display_name: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Whether [`RemoteProfileStore::remove_favorite`] is implemented.
    fn supports_favorite_removal(&self) -> bool {
        false
    }

    fn remove_favorite(&self, _index: u64) -> impl Future<Output = Result<()>> + Send {
        async {
            Err(SyncError::Unsupported {
                operation: "remove_favorite",
            })
        }
    }
}
