//! Backend API Client
//!
//! Talks to the Gamramstone backend. Every response goes through the
//! envelope classifier, so callers only ever see a typed payload or a
//! [`CoreError`].

use async_trait::async_trait;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use super::channel::ListSource;
use super::envelope::RawResponse;
use super::models::{ChannelStat, Video, WorkStatus};
use super::settings::{ClientConfig, RemoteSettings};
use super::{ChannelId, CoreError, CoreResult, LanguageCode, VideoId};

/// Body of `POST /api/update`
#[derive(Debug, Serialize)]
struct StatusUpdateRequest<'a> {
    lang: &'a str,
    videos: &'a [VideoId],
    test: bool,
}

/// HTTP client for the backend endpoints
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    /// Creates a client from the local configuration
    pub fn new(config: &ClientConfig) -> CoreResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| CoreError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: parse_base_url(&config.api_base_url)?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> CoreResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| CoreError::ConfigError(format!("Invalid endpoint {}: {}", path, e)))
    }

    /// `GET /api/lists?id=<channel>&tabs=<tab>`
    pub fn lists_url(&self, channel: ChannelId, tab: WorkStatus) -> CoreResult<Url> {
        let mut url = self.endpoint("api/lists")?;
        url.query_pairs_mut()
            .append_pair("id", channel.as_str())
            .append_pair("tabs", tab.as_str());
        Ok(url)
    }

    /// `GET /api/stats?id=<channel>`
    pub fn stats_url(&self, channel: ChannelId) -> CoreResult<Url> {
        let mut url = self.endpoint("api/stats")?;
        url.query_pairs_mut().append_pair("id", channel.as_str());
        Ok(url)
    }

    pub fn settings_url(&self) -> CoreResult<Url> {
        self.endpoint("api/settings")
    }

    pub fn update_url(&self) -> CoreResult<Url> {
        self.endpoint("api/update")
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> CoreResult<T> {
        debug!(%url, "GET");
        let response = self.client.get(url).send().await?;
        let raw = RawResponse::read(response).await?;
        Ok(raw.classify()?)
    }

    /// Lists the videos of one channel tab
    pub async fn fetch_list(&self, channel: ChannelId, tab: WorkStatus) -> CoreResult<Vec<Video>> {
        let videos: Vec<Video> = self.get(self.lists_url(channel, tab)?).await?;
        debug!(channel = %channel, tab = %tab, count = videos.len(), "Fetched video list");
        Ok(videos)
    }

    /// Upload progress of a channel
    pub async fn fetch_stats(&self, channel: ChannelId) -> CoreResult<ChannelStat> {
        self.get(self.stats_url(channel)?).await
    }

    /// Settings consumed at process start
    pub async fn fetch_settings(&self) -> CoreResult<RemoteSettings> {
        self.get(self.settings_url()?).await
    }

    /// Marks the given videos of a language as applied
    pub async fn confirm_status(
        &self,
        language: &LanguageCode,
        video_ids: &[VideoId],
        simulated: bool,
    ) -> CoreResult<()> {
        let body = StatusUpdateRequest {
            lang: language,
            videos: video_ids,
            test: simulated,
        };

        let response = self.client.post(self.update_url()?).json(&body).send().await?;
        let raw = RawResponse::read(response).await?;
        let _: Option<serde_json::Value> = raw.classify()?;

        info!(language = %language, videos = ?video_ids, simulated, "Status confirmed");
        Ok(())
    }
}

#[async_trait]
impl ListSource for ApiClient {
    async fn fetch_list(&self, channel: ChannelId, tab: WorkStatus) -> CoreResult<Vec<Video>> {
        ApiClient::fetch_list(self, channel, tab).await
    }

    async fn fetch_stats(&self, channel: ChannelId) -> CoreResult<ChannelStat> {
        ApiClient::fetch_stats(self, channel).await
    }
}

/// Parses a base URL so that relative endpoints join beneath it
pub(crate) fn parse_base_url(value: &str) -> CoreResult<Url> {
    let with_slash = if value.ends_with('/') {
        value.to_string()
    } else {
        format!("{}/", value)
    };
    let url = Url::parse(&with_slash)
        .map_err(|e| CoreError::ConfigError(format!("Invalid base URL {}: {}", value, e)))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(CoreError::ConfigError(format!(
            "Unsupported URL scheme '{}'. Only http/https are allowed.",
            scheme
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> ApiClient {
        let config = ClientConfig {
            api_base_url: base.to_string(),
            ..ClientConfig::default()
        };
        ApiClient::new(&config).unwrap()
    }

    #[test]
    fn test_lists_url() {
        let api = client("https://api.example.com");
        let url = api.lists_url(ChannelId::Jururu, WorkStatus::Wip).unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/api/lists?id=jururu&tabs=wip");
    }

    #[test]
    fn test_endpoints_keep_base_path() {
        let api = client("https://example.com/gamramstone");
        assert_eq!(
            api.stats_url(ChannelId::Ine).unwrap().as_str(),
            "https://example.com/gamramstone/api/stats?id=ine"
        );
        assert_eq!(
            api.settings_url().unwrap().as_str(),
            "https://example.com/gamramstone/api/settings"
        );
        assert_eq!(
            api.update_url().unwrap().as_str(),
            "https://example.com/gamramstone/api/update"
        );
    }

    #[test]
    fn test_parse_base_url_rejects_other_schemes() {
        assert!(parse_base_url("file:///tmp").is_err());
        assert!(parse_base_url("not a url").is_err());
        assert!(parse_base_url("http://localhost:3000").is_ok());
    }

    #[test]
    fn test_status_update_body() {
        let videos = vec!["abc".to_string()];
        let body = StatusUpdateRequest {
            lang: "en",
            videos: &videos,
            test: false,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({"lang": "en", "videos": ["abc"], "test": false}));
    }
}
