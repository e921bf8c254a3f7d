use serde::{Deserialize, Serialize};

use crate::domain::{AvatarId, BackgroundId, MontageId, MotionId, ReferenceId};

/// JSON body for `POST /motions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMotionRequest {
    pub avatar_id: AvatarId,
    pub reference_id: ReferenceId,
}

/// JSON body for `POST /montages`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMontageRequest {
    pub motion_id: MotionId,
    pub bg_video_id: BackgroundId,
}

/// Share sheet payload for a finished montage; mirrors what the web client
/// hands to `navigator.share`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharePayload {
    pub title: String,
    pub text: String,
    pub url: String,
}

impl SharePayload {
    pub fn for_montage(url: impl Into<String>) -> Self {
        Self {
            title: "My AI Montage".to_string(),
            text: "Check out this video I created with AI!".to_string(),
            url: url.into(),
        }
    }

    pub fn for_montage_result(montage: &crate::domain::Montage) -> Option<Self> {
        montage.output_url().map(Self::for_montage)
    }
}
