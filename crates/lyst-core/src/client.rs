//! OpenLyst catalogue client.

use std::time::Duration;

use lyst_schema::api::{ApiResponse, App, AppVersion, list_from_value};
use lyst_schema::Platform;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned an unsuccessful response for {url}: {message}")]
    Unsuccessful { url: String, message: String },

    #[error("Failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        source: serde_json::Error,
    },
}

/// Client for the OpenLyst API.
#[derive(Debug, Clone)]
pub struct OpenLystClient {
    http: Client,
    base_url: String,
    lang: String,
    timeout: Duration,
}

impl OpenLystClient {
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            lang: "en".to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = lang.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fetch all active apps for a platform.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failures, non-2xx statuses, an
    /// unsuccessful envelope or an undecodable body.
    pub async fn list_apps(&self, platform: Platform) -> Result<Vec<App>, ApiError> {
        let url = format!("{}/apps", self.base_url);
        tracing::info!("Fetching apps from {url} for platform {platform}");

        let data = self
            .get_envelope(
                &url,
                &[
                    ("platform", platform.as_str()),
                    ("lang", self.lang.as_str()),
                    ("filter", "active"),
                ],
            )
            .await?;

        let apps: Vec<App> = list_from_value(data);
        tracing::info!("Fetched {} apps for {platform}", apps.len());
        Ok(apps)
    }

    /// Fetch every published version of an app, newest first.
    ///
    /// # Errors
    ///
    /// Same conditions as [`OpenLystClient::list_apps`]. A `data` field that
    /// is not a list yields an empty vector rather than an error.
    pub async fn app_versions(&self, slug: &str) -> Result<Vec<AppVersion>, ApiError> {
        let url = format!("{}/apps/{slug}/versions", self.base_url);
        let data = self
            .get_envelope(&url, &[("lang", self.lang.as_str())])
            .await?;

        let versions: Vec<AppVersion> = list_from_value(data);
        tracing::debug!("Fetched {} versions for {slug}", versions.len());
        Ok(versions)
    }

    async fn get_envelope(&self, url: &str, query: &[(&str, &str)]) -> Result<Value, ApiError> {
        let body = self
            .http
            .get(url)
            .query(query)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        let envelope: ApiResponse<Value> =
            serde_json::from_slice(&body).map_err(|source| ApiError::Decode {
                url: url.to_string(),
                source,
            })?;

        if !envelope.success {
            return Err(ApiError::Unsuccessful {
                url: url.to_string(),
                message: envelope
                    .error
                    .unwrap_or_else(|| "no error message".to_string()),
            });
        }

        Ok(envelope.data.unwrap_or(Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn test_list_apps_sends_platform_filter() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/apps")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("platform".into(), "macOS".into()),
                Matcher::UrlEncoded("lang".into(), "en".into()),
                Matcher::UrlEncoded("filter".into(), "active".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"success": true, "data": [{"slug": "doggy", "name": "Doggy Days"}]}"#)
            .create_async()
            .await;

        let client = OpenLystClient::new(Client::new(), server.url());
        let apps = client.list_apps(Platform::MacOs).await.unwrap();

        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0].slug.as_deref(), Some("doggy"));
    }

    #[tokio::test]
    async fn test_unsuccessful_envelope_is_an_error() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/apps")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"success": false, "error": "maintenance"}"#)
            .create_async()
            .await;

        let client = OpenLystClient::new(Client::new(), server.url());
        let err = client.list_apps(Platform::Ios).await.unwrap_err();

        assert!(matches!(err, ApiError::Unsuccessful { ref message, .. } if message == "maintenance"));
    }

    #[tokio::test]
    async fn test_http_status_is_an_error() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/apps/doggy/versions")
            .match_query(Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        let client = OpenLystClient::new(Client::new(), server.url());
        let err = client.app_versions("doggy").await.unwrap_err();

        assert!(matches!(err, ApiError::Http(_)));
    }

    #[tokio::test]
    async fn test_versions_with_non_list_data_are_empty() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/apps/doggy/versions")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"success": true, "data": {"oops": 1}}"#)
            .create_async()
            .await;

        let client = OpenLystClient::new(Client::new(), format!("{}/", server.url()));
        let versions = client.app_versions("doggy").await.unwrap();

        assert!(versions.is_empty());
    }
}
