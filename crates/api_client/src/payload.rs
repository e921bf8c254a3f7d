//! Upload payloads and the local checks that run before anything touches
//! the wire.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use mime::Mime;
use thiserror::Error;

/// A binary body destined for a multipart upload.
#[derive(Debug, Clone)]
pub struct MediaPayload {
    pub file_name: String,
    pub content_type: Mime,
    pub bytes: Vec<u8>,
}

impl MediaPayload {
    pub fn new(file_name: impl Into<String>, content_type: Mime, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type,
            bytes,
        }
    }

    /// Reads a file and derives the content type from its extension.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let file_name = path
            .file_name()
            .ok_or_else(|| anyhow!("upload path '{}' has no file name", path.display()))?
            .to_string_lossy()
            .into_owned();
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read upload file '{}'", path.display()))?;
        let content_type = mime_guess::from_path(path).first_or_octet_stream();
        Ok(Self::new(file_name, content_type, bytes))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadValidationError {
    #[error("avatar images must be PNG or JPEG, got '{0}'")]
    UnsupportedImageType(String),
    #[error("reference clips must be MP4, got '{0}'")]
    UnsupportedReferenceType(String),
    #[error("background clips must be MP4, got '{0}'")]
    UnsupportedBackgroundType(String),
    #[error("a reference label is required before uploading")]
    MissingLabel,
    #[error("a background title is required before uploading")]
    MissingTitle,
}

fn is_mp4(content_type: &Mime) -> bool {
    content_type.type_() == mime::VIDEO && content_type.subtype() == mime::MP4
}

fn is_avatar_image(content_type: &Mime) -> bool {
    content_type.type_() == mime::IMAGE
        && (content_type.subtype() == mime::PNG || content_type.subtype() == mime::JPEG)
}

pub fn validate_avatar_upload(payload: &MediaPayload) -> Result<(), UploadValidationError> {
    if !is_avatar_image(&payload.content_type) {
        return Err(UploadValidationError::UnsupportedImageType(
            payload.content_type.to_string(),
        ));
    }
    Ok(())
}

pub fn validate_reference_upload(
    payload: &MediaPayload,
    label: &str,
) -> Result<(), UploadValidationError> {
    if label.trim().is_empty() {
        return Err(UploadValidationError::MissingLabel);
    }
    if !is_mp4(&payload.content_type) {
        return Err(UploadValidationError::UnsupportedReferenceType(
            payload.content_type.to_string(),
        ));
    }
    Ok(())
}

pub fn validate_background_upload(
    payload: &MediaPayload,
    title: &str,
) -> Result<(), UploadValidationError> {
    if title.trim().is_empty() {
        return Err(UploadValidationError::MissingTitle);
    }
    if !is_mp4(&payload.content_type) {
        return Err(UploadValidationError::UnsupportedBackgroundType(
            payload.content_type.to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(content_type: Mime) -> MediaPayload {
        MediaPayload::new("clip.bin", content_type, vec![0u8; 4])
    }

    #[test]
    fn avatar_accepts_png_and_jpeg_only() {
        assert!(validate_avatar_upload(&payload(mime::IMAGE_PNG)).is_ok());
        assert!(validate_avatar_upload(&payload(mime::IMAGE_JPEG)).is_ok());
        assert_eq!(
            validate_avatar_upload(&payload(mime::IMAGE_GIF)),
            Err(UploadValidationError::UnsupportedImageType(
                "image/gif".into()
            ))
        );
    }

    #[test]
    fn reference_requires_label_before_type_check() {
        let mp4: Mime = "video/mp4".parse().expect("mime");
        assert_eq!(
            validate_reference_upload(&payload(mp4.clone()), "  "),
            Err(UploadValidationError::MissingLabel)
        );
        assert!(validate_reference_upload(&payload(mp4), "Waving Hello").is_ok());
        assert_eq!(
            validate_reference_upload(&payload(mime::TEXT_PLAIN), "Waving Hello"),
            Err(UploadValidationError::UnsupportedReferenceType(
                "text/plain".into()
            ))
        );
    }

    #[test]
    fn background_requires_title_and_mp4() {
        let mp4: Mime = "video/mp4".parse().expect("mime");
        assert_eq!(
            validate_background_upload(&payload(mp4.clone()), ""),
            Err(UploadValidationError::MissingTitle)
        );
        assert!(validate_background_upload(&payload(mp4), "Modern Office").is_ok());
    }
}
