use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

id_newtype!(AvatarId);
id_newtype!(ReferenceId);
id_newtype!(BackgroundId);
id_newtype!(MotionId);
id_newtype!(MontageId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionStatus {
    Queued,
    Processing,
    Success,
    Failed,
}

impl MotionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, MotionStatus::Success | MotionStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MontageStatus {
    Queued,
    Processing,
    Ready,
    Failed,
}

impl MontageStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, MontageStatus::Ready | MontageStatus::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Avatar {
    pub id: AvatarId,
    pub name: String,
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub id: ReferenceId,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
}

impl Reference {
    /// Display name: the upload label when present, the raw name otherwise.
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Background {
    pub id: BackgroundId,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub video_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
}

impl Background {
    pub fn display_name(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Motion {
    pub id: MotionId,
    pub status: MotionStatus,
    pub avatar_id: AvatarId,
    pub reference_id: ReferenceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motion_video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motion_thumbnail_url: Option<String>,
}

impl Motion {
    /// The generated clip url, present only once the job has really finished.
    pub fn output_url(&self) -> Option<&str> {
        self.motion_video_url.as_deref()
    }

    /// Terminal success requires both the sentinel status and a populated url.
    pub fn is_complete(&self) -> bool {
        self.status == MotionStatus::Success && self.output_url().is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Montage {
    pub id: MontageId,
    pub status: MontageStatus,
    pub motion_id: MotionId,
    pub bg_video_id: BackgroundId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_thumbnail_url: Option<String>,
}

impl Montage {
    /// Some deployments fill `video_url` instead of `final_video_url`.
    pub fn output_url(&self) -> Option<&str> {
        self.final_video_url
            .as_deref()
            .or(self.video_url.as_deref())
    }

    pub fn is_complete(&self) -> bool {
        self.status == MontageStatus::Ready && self.output_url().is_some()
    }
}

/// Ordered wizard stages. Expansion may move backward for review; the
/// current step only ever moves forward (or back to `Avatar` via reset).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    #[default]
    Avatar,
    Reference,
    MotionGeneration,
    Background,
    MontageGeneration,
    Result,
}

impl WizardStep {
    pub const ALL: [WizardStep; 6] = [
        WizardStep::Avatar,
        WizardStep::Reference,
        WizardStep::MotionGeneration,
        WizardStep::Background,
        WizardStep::MontageGeneration,
        WizardStep::Result,
    ];

    pub fn index(self) -> usize {
        match self {
            WizardStep::Avatar => 0,
            WizardStep::Reference => 1,
            WizardStep::MotionGeneration => 2,
            WizardStep::Background => 3,
            WizardStep::MontageGeneration => 4,
            WizardStep::Result => 5,
        }
    }

    pub fn is_at_or_before(self, other: WizardStep) -> bool {
        self.index() <= other.index()
    }
}

impl std::fmt::Display for WizardStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WizardStep::Avatar => "avatar",
            WizardStep::Reference => "reference",
            WizardStep::MotionGeneration => "motion_generation",
            WizardStep::Background => "background",
            WizardStep::MontageGeneration => "montage_generation",
            WizardStep::Result => "result",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_order_is_monotonic() {
        for pair in WizardStep::ALL.windows(2) {
            assert!(pair[0].index() < pair[1].index());
        }
    }

    #[test]
    fn motion_statuses_round_trip_snake_case() {
        let parsed: MotionStatus = serde_json::from_str("\"processing\"").expect("parse");
        assert_eq!(parsed, MotionStatus::Processing);
        assert!(!parsed.is_terminal());
        assert!(MotionStatus::Failed.is_terminal());
    }

    #[test]
    fn montage_success_requires_output_url() {
        let mut montage = Montage {
            id: MontageId::new("m-1"),
            status: MontageStatus::Ready,
            motion_id: MotionId::new("mo-1"),
            bg_video_id: BackgroundId::new("bg-1"),
            final_video_url: None,
            video_url: None,
            final_thumbnail_url: None,
        };
        assert!(!montage.is_complete());

        montage.video_url = Some("https://cdn.example/final.mp4".into());
        assert!(montage.is_complete());
        assert_eq!(montage.output_url(), Some("https://cdn.example/final.mp4"));

        montage.final_video_url = Some("https://cdn.example/preferred.mp4".into());
        assert_eq!(
            montage.output_url(),
            Some("https://cdn.example/preferred.mp4")
        );
    }
}
