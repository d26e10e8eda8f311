//! YouTube Data API adapter
//!
//! Pushes a track's localized title and description into the video's
//! `localizations`, then uploads each caption file through the media upload
//! endpoint.

use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use super::ApplyRequest;
use crate::core::api::parse_base_url;
use crate::core::envelope::{ApiFailure, RawResponse};
use crate::core::models::CaptionFile;
use crate::core::settings::ClientConfig;
use crate::core::{CoreError, CoreResult};

/// Snippet fields carried over when the video is written back
const KEPT_SNIPPET_FIELDS: [&str; 4] = ["title", "description", "categoryId", "tags"];

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    error: GoogleError,
}

#[derive(Debug, Deserialize)]
struct GoogleError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<Value>,
}

/// Client for the YouTube Data API v3
#[derive(Debug, Clone)]
pub struct YouTubeClient {
    client: reqwest::Client,
    api_base: Url,
    upload_base: Url,
    default_language: String,
}

impl YouTubeClient {
    pub fn new(config: &ClientConfig) -> CoreResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| CoreError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base: parse_base_url(&config.youtube_api_base_url)?,
            upload_base: parse_base_url(&config.youtube_upload_base_url)?,
            default_language: config.default_language.clone(),
        })
    }

    /// Pushes the localization and every caption file of `request`
    pub async fn apply_captions(&self, credential: &str, request: &ApplyRequest) -> CoreResult<()> {
        self.update_localization(
            credential,
            &request.video_id,
            &request.language,
            &request.title,
            &request.description,
        )
        .await?;

        for file in &request.files {
            self.upload_caption(credential, &request.video_id, &request.language, file)
                .await?;
        }

        info!(
            video_id = %request.video_id,
            language = %request.language,
            files = request.files.len(),
            "Captions pushed to YouTube"
        );
        Ok(())
    }

    fn videos_url(&self, video_id: Option<&str>) -> CoreResult<Url> {
        let mut url = self
            .api_base
            .join("videos")
            .map_err(|e| CoreError::ConfigError(format!("Invalid YouTube API URL: {}", e)))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("part", "snippet,localizations");
            if let Some(id) = video_id {
                query.append_pair("id", id);
            }
        }
        Ok(url)
    }

    fn captions_url(&self) -> CoreResult<Url> {
        let mut url = self
            .upload_base
            .join("captions")
            .map_err(|e| CoreError::ConfigError(format!("Invalid YouTube upload URL: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("part", "snippet")
            .append_pair("uploadType", "multipart");
        Ok(url)
    }

    /// Sets `localizations[language]` on the video, keeping its snippet
    pub async fn update_localization(
        &self,
        credential: &str,
        video_id: &str,
        language: &str,
        title: &str,
        description: &str,
    ) -> CoreResult<()> {
        let url = self.videos_url(Some(video_id))?;
        debug!(%url, "Fetching video snippet");
        let response = self.client.get(url).bearer_auth(credential).send().await?;
        let raw = RawResponse::read(response).await?;
        let list: VideoListResponse = google_json(&raw)?;

        let current = list
            .items
            .into_iter()
            .next()
            .ok_or_else(|| ApiFailure::Application("video not found".to_string()))?;

        let body = merge_localization(
            &current,
            video_id,
            language,
            title,
            description,
            &self.default_language,
        );

        let response = self
            .client
            .put(self.videos_url(None)?)
            .bearer_auth(credential)
            .json(&body)
            .send()
            .await?;
        let raw = RawResponse::read(response).await?;
        let _: Value = google_json(&raw)?;

        debug!(video_id, language, "Localization updated");
        Ok(())
    }

    /// Downloads one caption file and uploads it as a caption track
    pub async fn upload_caption(
        &self,
        credential: &str,
        video_id: &str,
        language: &str,
        file: &CaptionFile,
    ) -> CoreResult<()> {
        let content = self.download(file).await?;

        let boundary = format!("gamramstone-{}", ulid::Ulid::new());
        let snippet = json!({
            "snippet": {
                "videoId": video_id,
                "language": language,
                "name": file.stem(),
            }
        });
        let body = multipart_related(&boundary, &snippet, &file.media_type, &content);

        let response = self
            .client
            .post(self.captions_url()?)
            .bearer_auth(credential)
            .header(
                CONTENT_TYPE,
                format!("multipart/related; boundary={}", boundary),
            )
            .body(body)
            .send()
            .await?;
        let raw = RawResponse::read(response).await?;
        let _: Value = google_json(&raw)?;

        debug!(video_id, language, file = %file.filename, "Caption uploaded");
        Ok(())
    }

    async fn download(&self, file: &CaptionFile) -> CoreResult<Vec<u8>> {
        let url = Url::parse(&file.url).map_err(|e| {
            CoreError::ValidationError(format!("Invalid caption URL {}: {}", file.url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(CoreError::ValidationError(format!(
                "Caption file {} has unsupported URL scheme '{}'",
                file.filename,
                url.scheme()
            )));
        }

        let response = self.client.get(url).send().await?;
        let raw = RawResponse::read(response).await?;
        if !raw.is_success() {
            return Err(ApiFailure::from_status(raw.status, &raw.status_text).into());
        }
        Ok(raw.body)
    }
}

/// Parses a Google API response, mapping error bodies to failures
fn google_json<T: serde::de::DeserializeOwned>(raw: &RawResponse) -> CoreResult<T> {
    if !raw.is_success() {
        let failure = match serde_json::from_slice::<GoogleErrorBody>(&raw.body) {
            Ok(body) => ApiFailure::Application(body.error.message),
            Err(_) => ApiFailure::from_status(raw.status, &raw.status_text),
        };
        return Err(failure.into());
    }

    serde_json::from_slice(&raw.body).map_err(|e| {
        debug!(status = raw.status, "Unexpected YouTube response: {}", e);
        ApiFailure::RequestFailed {
            status: raw.status,
            status_text: raw.status_text.clone(),
        }
        .into()
    })
}

/// Builds the `videos.update` body with one localization set
fn merge_localization(
    current: &Value,
    video_id: &str,
    language: &str,
    title: &str,
    description: &str,
    default_language: &str,
) -> Value {
    let source = current.get("snippet").and_then(Value::as_object);

    let mut snippet = Map::new();
    for field in KEPT_SNIPPET_FIELDS {
        if let Some(value) = source.and_then(|s| s.get(field)) {
            snippet.insert(field.to_string(), value.clone());
        }
    }
    let default = source
        .and_then(|s| s.get("defaultLanguage"))
        .cloned()
        .unwrap_or_else(|| Value::String(default_language.to_string()));
    snippet.insert("defaultLanguage".to_string(), default);

    let mut localizations = current
        .get("localizations")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    localizations.insert(
        language.to_string(),
        json!({ "title": title, "description": description }),
    );

    json!({
        "id": video_id,
        "snippet": snippet,
        "localizations": localizations,
    })
}

/// Encodes a `multipart/related` body: JSON metadata, then the media
fn multipart_related(boundary: &str, metadata: &Value, media_type: &str, media: &[u8]) -> Vec<u8> {
    let media_type = if media_type.is_empty() {
        "application/octet-stream"
    } else {
        media_type
    };

    let mut body = Vec::with_capacity(media.len() + 256);
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata.to_string().as_bytes());
    body.extend_from_slice(format!("\r\n--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", media_type).as_bytes());
    body.extend_from_slice(media);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}
