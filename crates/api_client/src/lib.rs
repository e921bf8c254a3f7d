use std::path::Path;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{multipart, Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared::{
    domain::{
        Avatar, AvatarId, Background, BackgroundId, Montage, MontageId, Motion, MotionId,
        Reference, ReferenceId,
    },
    error::{ApiError, ApiException},
    protocol::{CreateMontageRequest, CreateMotionRequest},
};
use tracing::{debug, info};

pub mod payload;

pub use payload::{
    validate_avatar_upload, validate_background_upload, validate_reference_upload, MediaPayload,
    UploadValidationError,
};

const AVATARS: &str = "/avatars";
const REFERENCES: &str = "/references";
const BACKGROUNDS: &str = "/backgrounds";
const MOTIONS: &str = "/motions";
const MONTAGES: &str = "/montages";

/// The remote reaction service seen by the wizard and gallery. The session
/// layer only talks to this trait so tests can script job status sequences.
#[async_trait]
pub trait ReactionApi: Send + Sync {
    async fn list_avatars(&self) -> Result<Vec<Avatar>>;
    async fn list_references(&self) -> Result<Vec<Reference>>;
    async fn list_backgrounds(&self) -> Result<Vec<Background>>;
    async fn list_motions(&self) -> Result<Vec<Motion>>;
    async fn list_montages(&self) -> Result<Vec<Montage>>;

    async fn upload_avatar(&self, payload: MediaPayload) -> Result<Avatar>;
    async fn upload_reference(&self, payload: MediaPayload, label: &str) -> Result<Reference>;
    async fn upload_background(&self, payload: MediaPayload, title: &str) -> Result<Background>;

    async fn create_motion(
        &self,
        avatar_id: &AvatarId,
        reference_id: &ReferenceId,
    ) -> Result<Motion>;
    async fn motion_status(&self, id: &MotionId) -> Result<Motion>;

    async fn create_montage(
        &self,
        motion_id: &MotionId,
        bg_video_id: &BackgroundId,
    ) -> Result<Montage>;
    async fn montage_status(&self, id: &MontageId) -> Result<Montage>;

    async fn delete_avatar(&self, id: &AvatarId) -> Result<()>;
    async fn delete_reference(&self, id: &ReferenceId) -> Result<()>;
    async fn delete_background(&self, id: &BackgroundId) -> Result<()>;
    async fn delete_motion(&self, id: &MotionId) -> Result<()>;
    async fn delete_montage(&self, id: &MontageId) -> Result<()>;
}

/// reqwest-backed implementation of [`ReactionApi`].
pub struct HttpReactionApi {
    http: Client,
    base_url: String,
}

impl HttpReactionApi {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            http: Client::new(),
            base_url: normalize_base_url(&base_url.into())?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .http
            .get(self.endpoint(path))
            .send()
            .await
            .with_context(|| format!("failed to reach GET {path}"))?;
        let response = expect_success(path, response).await?;
        response
            .json()
            .await
            .with_context(|| format!("invalid response body from GET {path}"))
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let response = self
            .http
            .post(self.endpoint(path))
            .json(body)
            .send()
            .await
            .with_context(|| format!("failed to reach POST {path}"))?;
        let response = expect_success(path, response).await?;
        response
            .json()
            .await
            .with_context(|| format!("invalid response body from POST {path}"))
    }

    async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: multipart::Form,
    ) -> Result<T> {
        let response = self
            .http
            .post(self.endpoint(path))
            .multipart(form)
            .send()
            .await
            .with_context(|| format!("failed to reach POST {path}"))?;
        let response = expect_success(path, response).await?;
        response
            .json()
            .await
            .with_context(|| format!("invalid response body from POST {path}"))
    }

    async fn delete_by_id(&self, resource: &str, id: &str) -> Result<()> {
        let path = format!("{resource}/{id}");
        let response = self
            .http
            .delete(self.endpoint(&path))
            .send()
            .await
            .with_context(|| format!("failed to reach DELETE {path}"))?;
        expect_success(&path, response).await?;
        info!(resource, id, "deleted remote record");
        Ok(())
    }

    /// Streams a finished output (or any media url) to a local file. The url
    /// is absolute and usually points at a CDN, not the API base.
    pub async fn download(&self, url: &str, destination: &Path) -> Result<u64> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("failed to reach {url}"))?;
        let response = expect_success(url, response).await?;
        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("failed to read body from {url}"))?;
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await.with_context(|| {
                format!("failed to create directory '{}'", parent.display())
            })?;
        }
        tokio::fs::write(destination, &bytes)
            .await
            .with_context(|| format!("failed to write '{}'", destination.display()))?;
        debug!(url, bytes = bytes.len(), path = %destination.display(), "download complete");
        Ok(bytes.len() as u64)
    }
}

fn file_part(payload: MediaPayload) -> Result<multipart::Part> {
    let content_type = payload.content_type.to_string();
    multipart::Part::bytes(payload.bytes)
        .file_name(payload.file_name)
        .mime_str(&content_type)
        .with_context(|| format!("invalid upload content type '{content_type}'"))
}

async fn expect_success(path: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    // Prefer the structured error body when the service sends one.
    let message = match response.json::<ApiError>().await {
        Ok(body) => ApiException::from(body).to_string(),
        Err(_) => status.to_string(),
    };
    Err(anyhow!("{path} failed: {message}"))
}

/// Trims trailing slashes and rejects anything that is not an http(s) url.
pub fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    let parsed = url::Url::parse(trimmed)
        .with_context(|| format!("invalid API base url '{raw}'"))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(anyhow!(
            "API base url must start with http:// or https://, got '{raw}'"
        ));
    }
    Ok(trimmed.to_string())
}

#[async_trait]
impl ReactionApi for HttpReactionApi {
    async fn list_avatars(&self) -> Result<Vec<Avatar>> {
        self.get_json(AVATARS).await
    }

    async fn list_references(&self) -> Result<Vec<Reference>> {
        self.get_json(REFERENCES).await
    }

    async fn list_backgrounds(&self) -> Result<Vec<Background>> {
        self.get_json(BACKGROUNDS).await
    }

    async fn list_motions(&self) -> Result<Vec<Motion>> {
        self.get_json(MOTIONS).await
    }

    async fn list_montages(&self) -> Result<Vec<Montage>> {
        self.get_json(MONTAGES).await
    }

    async fn upload_avatar(&self, payload: MediaPayload) -> Result<Avatar> {
        validate_avatar_upload(&payload)?;
        let form = multipart::Form::new().part("file", file_part(payload)?);
        let avatar: Avatar = self.post_multipart(AVATARS, form).await?;
        info!(id = %avatar.id, "uploaded avatar");
        Ok(avatar)
    }

    async fn upload_reference(&self, payload: MediaPayload, label: &str) -> Result<Reference> {
        validate_reference_upload(&payload, label)?;
        let form = multipart::Form::new()
            .part("file", file_part(payload)?)
            .text("label", label.trim().to_string());
        let reference: Reference = self.post_multipart(REFERENCES, form).await?;
        info!(id = %reference.id, label, "uploaded motion reference");
        Ok(reference)
    }

    async fn upload_background(&self, payload: MediaPayload, title: &str) -> Result<Background> {
        validate_background_upload(&payload, title)?;
        let form = multipart::Form::new()
            .part("file", file_part(payload)?)
            .text("title", title.trim().to_string());
        let background: Background = self.post_multipart(BACKGROUNDS, form).await?;
        info!(id = %background.id, title, "uploaded background");
        Ok(background)
    }

    async fn create_motion(
        &self,
        avatar_id: &AvatarId,
        reference_id: &ReferenceId,
    ) -> Result<Motion> {
        let body = CreateMotionRequest {
            avatar_id: avatar_id.clone(),
            reference_id: reference_id.clone(),
        };
        let motion: Motion = self.post_json(MOTIONS, &body).await?;
        info!(id = %motion.id, status = ?motion.status, "submitted motion job");
        Ok(motion)
    }

    async fn motion_status(&self, id: &MotionId) -> Result<Motion> {
        self.get_json(&format!("{MOTIONS}/{id}")).await
    }

    async fn create_montage(
        &self,
        motion_id: &MotionId,
        bg_video_id: &BackgroundId,
    ) -> Result<Montage> {
        let body = CreateMontageRequest {
            motion_id: motion_id.clone(),
            bg_video_id: bg_video_id.clone(),
        };
        let montage: Montage = self.post_json(MONTAGES, &body).await?;
        info!(id = %montage.id, status = ?montage.status, "submitted montage job");
        Ok(montage)
    }

    async fn montage_status(&self, id: &MontageId) -> Result<Montage> {
        self.get_json(&format!("{MONTAGES}/{id}")).await
    }

    async fn delete_avatar(&self, id: &AvatarId) -> Result<()> {
        self.delete_by_id(AVATARS, id.as_str()).await
    }

    async fn delete_reference(&self, id: &ReferenceId) -> Result<()> {
        self.delete_by_id(REFERENCES, id.as_str()).await
    }

    async fn delete_background(&self, id: &BackgroundId) -> Result<()> {
        self.delete_by_id(BACKGROUNDS, id.as_str()).await
    }

    async fn delete_motion(&self, id: &MotionId) -> Result<()> {
        self.delete_by_id(MOTIONS, id.as_str()).await
    }

    async fn delete_montage(&self, id: &MontageId) -> Result<()> {
        self.delete_by_id(MONTAGES, id.as_str()).await
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
