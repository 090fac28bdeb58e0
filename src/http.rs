//! HTTP client for the travel backend.
//!
//! This module provides:
//! - [`RemoteProfileStore`] over the profile endpoints
//! - Destination, host and experience-request endpoints
//! - [`load_catalog`], which keeps an offline copy of the catalog in the
//!   local cache and serves it when the backend is unreachable
//!
//! There is no retry policy; the only timeout is the client's request
//! timeout from [`BackendConfig`].

use std::time::Duration;

use base64::Engine;
use log::{debug, info, warn};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::cache::LocalCache;
use crate::catalog::{Catalog, Destination};
use crate::config::BackendConfig;
use crate::error::{Result, SyncError};
use crate::remote::{RemoteProfileStore, UserProfileView, UserRole};
use crate::store::KeyValueStore;

/// Community host listed on a destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Host {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub trust_index: f32,
    #[serde(default)]
    pub destination_id: Option<String>,
}

/// Request to experience a destination with a local host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperienceRequestInput {
    pub destination_id: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DestinationIndexBody {
    destination_index: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateProfileBody<'a> {
    role: UserRole,
    display_name: &'a str,
}

/// REST client for the travel backend.
pub struct HttpBackend {
    client: Client,
    base_url: String,
    auth_header: Option<String>,
    favorite_removal: bool,
}

impl HttpBackend {
    /// Create a backend client from configuration.
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SyncError::Config {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        let auth_header = config.api_key.as_deref().map(|key| {
            let encoded =
                base64::engine::general_purpose::STANDARD.encode(format!("API_KEY:{}", key));
            format!("Basic {}", encoded)
        });

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth_header,
            favorite_removal: config.favorite_removal,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth_header {
            Some(auth) => request.header("Authorization", auth.as_str()),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| SyncError::remote(format!("{}: {}", what, e), None))?;
        debug!("[HttpBackend] {} -> {}", what, response.status());
        Ok(response)
    }

    /// GET returning `None` on 404.
    async fn get_optional<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let what = format!("GET {}", path);
        let response = self.send(self.client.get(self.url(path)), &what).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check_status(response, &what)?;
        parse_json(response, &what).await.map(Some)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let what = format!("GET {}", path);
        let response = self.send(self.client.get(self.url(path)), &what).await?;
        let response = check_status(response, &what)?;
        parse_json(response, &what).await
    }

    async fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<()> {
        let what = format!("POST {}", path);
        let response = self
            .send(self.client.post(self.url(path)).json(body), &what)
            .await?;
        check_status(response, &what)?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let what = format!("DELETE {}", path);
        let response = self.send(self.client.delete(self.url(path)), &what).await?;
        check_status(response, &what)?;
        Ok(())
    }

    // ========================================================================
    // Catalog, hosts and requests
    // ========================================================================

    pub async fn list_destinations(&self) -> Result<Vec<Destination>> {
        self.get_json("destinations").await
    }

    pub async fn get_destination(&self, id: &str) -> Result<Option<Destination>> {
        self.get_optional(&format!("destinations/{}", id)).await
    }

    pub async fn list_hosts(&self) -> Result<Vec<Host>> {
        self.get_json("hosts").await
    }

    pub async fn get_host(&self, id: &str) -> Result<Option<Host>> {
        self.get_optional(&format!("hosts/{}", id)).await
    }

    pub async fn submit_experience_request(&self, request: &ExperienceRequestInput) -> Result<()> {
        self.post_json("requests", request).await?;
        info!(
            "[HttpBackend] Submitted experience request for {}",
            request.destination_id
        );
        Ok(())
    }
}

impl RemoteProfileStore for HttpBackend {
    async fn get_caller_user_profile(&self) -> Result<Option<UserProfileView>> {
        self.get_optional("profile").await
    }

    async fn save_favorite(&self, index: u64) -> Result<()> {
        self.post_json(
            "profile/favorites",
            &DestinationIndexBody {
                destination_index: index,
            },
        )
        .await
    }

    async fn add_past_exploration(&self, index: u64) -> Result<()> {
        self.post_json(
            "profile/explorations",
            &DestinationIndexBody {
                destination_index: index,
            },
        )
        .await
    }

    async fn create_user_profile(&self, role: UserRole, display_name: &str) -> Result<()> {
        self.post_json("profile", &CreateProfileBody { role, display_name })
            .await
    }

    fn supports_favorite_removal(&self) -> bool {
        self.favorite_removal
    }

    async fn remove_favorite(&self, index: u64) -> Result<()> {
        if !self.favorite_removal {
            return Err(SyncError::Unsupported {
                operation: "remove_favorite",
            });
        }
        self.delete(&format!("profile/favorites/{}", index)).await
    }
}

fn status_error(status: StatusCode, what: &str) -> SyncError {
    SyncError::remote(format!("{}: HTTP {}", what, status), Some(status.as_u16()))
}

fn check_status(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(status_error(status, what))
    }
}

async fn parse_json<T: DeserializeOwned>(response: Response, what: &str) -> Result<T> {
    response
        .json::<T>()
        .await
        .map_err(|e| SyncError::remote(format!("{}: parse error: {}", what, e), None))
}

/// Fetch the catalog, keeping the local offline copy current.
///
/// When the fetch fails the cached copy is served instead; with no cached
/// copy the fetch error is returned.
pub async fn load_catalog<S: KeyValueStore>(
    backend: &HttpBackend,
    cache: &LocalCache<S>,
) -> Result<Catalog> {
    match backend.list_destinations().await {
        Ok(destinations) => {
            info!("[HttpBackend] Loaded {} destinations", destinations.len());
            cache.cache_destinations(&destinations);
            Ok(Catalog::new(destinations))
        }
        Err(e) => match cache.cached_destinations() {
            Some(cached) => {
                warn!(
                    "[HttpBackend] Offline ({}), serving {} cached destinations",
                    e,
                    cached.len()
                );
                Ok(Catalog::new(cached))
            }
            None => Err(e),
        },
    }
}
