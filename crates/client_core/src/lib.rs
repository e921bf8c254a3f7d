use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use api_client::ReactionApi;
use shared::{
    domain::{
        Avatar, Background, Montage, MontageId, MontageStatus, Motion, MotionId, MotionStatus,
        Reference, WizardStep,
    },
    protocol::SharePayload,
};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tracing::{info, warn};

pub mod gallery;
pub mod media_cache;

/// Fixed delay between job status checks.
pub const POLL_INTERVAL: Duration = Duration::from_secs(15);

/// The wizard's view state. `Default` is the canonical initial record that
/// `reset` restores.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WizardState {
    pub current_step: WizardStep,
    pub expanded_step: WizardStep,
    pub selected_avatar: Option<Avatar>,
    pub selected_reference: Option<Reference>,
    pub motion_task: Option<Motion>,
    pub selected_background: Option<Background>,
    pub montage_task: Option<Montage>,
    pub error: Option<String>,
    pub is_loading: bool,
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    StepAdvanced(WizardStep),
    StepExpanded(WizardStep),
    MotionUpdated(Motion),
    MotionReady(Motion),
    MontageUpdated(Montage),
    MontageReady(Montage),
    Error(String),
    Reset,
}

/// The three collections the wizard needs up front.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub avatars: Vec<Avatar>,
    pub references: Vec<Reference>,
    pub backgrounds: Vec<Background>,
}

struct SessionInner {
    state: WizardState,
    poll_interval: Duration,
}

/// Drives the six-step wizard: selections, the two job submissions, and the
/// recurring status poll. At most one poll task is live at a time; terminal
/// job status, a transport failure, and `reset` all stop it.
pub struct WizardSession {
    api: Arc<dyn ReactionApi>,
    inner: Mutex<SessionInner>,
    poll_task: Mutex<Option<JoinHandle<()>>>,
    events: broadcast::Sender<SessionEvent>,
}

impl WizardSession {
    pub fn new(api: Arc<dyn ReactionApi>) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            api,
            inner: Mutex::new(SessionInner {
                state: WizardState::default(),
                poll_interval: POLL_INTERVAL,
            }),
            poll_task: Mutex::new(None),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> WizardState {
        self.inner.lock().await.state.clone()
    }

    #[cfg(test)]
    async fn set_poll_interval(&self, interval: Duration) {
        self.inner.lock().await.poll_interval = interval;
    }

    /// Fetches avatars, references, and backgrounds concurrently for the
    /// opening screens.
    pub async fn load_catalog(&self) -> Result<Catalog> {
        let loaded = futures::try_join!(
            self.api.list_avatars(),
            self.api.list_references(),
            self.api.list_backgrounds(),
        );
        match loaded {
            Ok((avatars, references, backgrounds)) => Ok(Catalog {
                avatars,
                references,
                backgrounds,
            }),
            Err(err) => {
                self.surface_error("failed to load initial data").await;
                Err(err.context("failed to load initial data"))
            }
        }
    }

    /// Expands a step for review. Allowed only for steps already reached;
    /// jumping ahead of the current step is refused.
    pub async fn expand_step(&self, step: WizardStep) -> bool {
        {
            let mut inner = self.inner.lock().await;
            if !step.is_at_or_before(inner.state.current_step) {
                return false;
            }
            inner.state.expanded_step = step;
        }
        let _ = self.events.send(SessionEvent::StepExpanded(step));
        true
    }

    /// Stores the avatar choice. Selecting on the very first step advances
    /// the wizard to reference selection; later re-selections only swap the
    /// avatar and re-open the reference step for review.
    pub async fn select_avatar(&self, avatar: Avatar) {
        let advanced = {
            let mut inner = self.inner.lock().await;
            inner.state.selected_avatar = Some(avatar);
            let advanced = inner.state.current_step == WizardStep::Avatar;
            if advanced {
                inner.state.current_step = WizardStep::Reference;
            }
            inner.state.expanded_step = WizardStep::Reference;
            advanced
        };
        if advanced {
            let _ = self
                .events
                .send(SessionEvent::StepAdvanced(WizardStep::Reference));
        }
        let _ = self
            .events
            .send(SessionEvent::StepExpanded(WizardStep::Reference));
    }

    pub async fn select_reference(&self, reference: Reference) {
        self.inner.lock().await.state.selected_reference = Some(reference);
    }

    pub async fn select_background(&self, background: Background) {
        self.inner.lock().await.state.selected_background = Some(background);
    }

    /// Submits the motion job and starts the status poll. Requires an avatar
    /// and a reference and no job already in flight.
    pub async fn start_motion_generation(self: &Arc<Self>) -> Result<()> {
        let (avatar_id, reference_id) = {
            let mut inner = self.inner.lock().await;
            if inner.state.is_loading {
                return Err(anyhow!("a generation job is already in flight"));
            }
            let avatar_id = inner
                .state
                .selected_avatar
                .as_ref()
                .map(|avatar| avatar.id.clone())
                .ok_or_else(|| anyhow!("select an avatar first"))?;
            let reference_id = inner
                .state
                .selected_reference
                .as_ref()
                .map(|reference| reference.id.clone())
                .ok_or_else(|| anyhow!("select a motion reference first"))?;
            inner.state.is_loading = true;
            inner.state.error = None;
            advance_to(&mut inner.state, WizardStep::MotionGeneration);
            (avatar_id, reference_id)
        };
        let _ = self
            .events
            .send(SessionEvent::StepAdvanced(WizardStep::MotionGeneration));

        match self.api.create_motion(&avatar_id, &reference_id).await {
            Ok(motion) => {
                info!(motion_id = %motion.id, "motion job accepted; polling for completion");
                self.inner.lock().await.state.motion_task = Some(motion.clone());
                let _ = self.events.send(SessionEvent::MotionUpdated(motion.clone()));
                self.spawn_motion_poll(motion.id).await;
                Ok(())
            }
            Err(err) => {
                self.surface_error("failed to start motion generation").await;
                Err(err.context("failed to start motion generation"))
            }
        }
    }

    /// Submits the montage job over the finished motion and the selected
    /// background, then starts the status poll.
    pub async fn start_montage_generation(self: &Arc<Self>) -> Result<()> {
        let (motion_id, background_id) = {
            let mut inner = self.inner.lock().await;
            if inner.state.is_loading {
                return Err(anyhow!("a generation job is already in flight"));
            }
            let motion_id = inner
                .state
                .motion_task
                .as_ref()
                .map(|motion| motion.id.clone())
                .ok_or_else(|| anyhow!("generate a motion first"))?;
            let background_id = inner
                .state
                .selected_background
                .as_ref()
                .map(|background| background.id.clone())
                .ok_or_else(|| anyhow!("select a background first"))?;
            inner.state.is_loading = true;
            inner.state.error = None;
            advance_to(&mut inner.state, WizardStep::MontageGeneration);
            (motion_id, background_id)
        };
        let _ = self
            .events
            .send(SessionEvent::StepAdvanced(WizardStep::MontageGeneration));

        match self.api.create_montage(&motion_id, &background_id).await {
            Ok(montage) => {
                info!(montage_id = %montage.id, "montage job accepted; polling for completion");
                self.inner.lock().await.state.montage_task = Some(montage.clone());
                let _ = self
                    .events
                    .send(SessionEvent::MontageUpdated(montage.clone()));
                self.spawn_montage_poll(montage.id).await;
                Ok(())
            }
            Err(err) => {
                self.surface_error("failed to start montage generation")
                    .await;
                Err(err.context("failed to start montage generation"))
            }
        }
    }

    /// Share sheet payload for the finished montage, if there is one.
    pub async fn share_payload(&self) -> Option<SharePayload> {
        let inner = self.inner.lock().await;
        inner
            .state
            .montage_task
            .as_ref()
            .and_then(SharePayload::for_montage_result)
    }

    /// Cancels any active poll. Safe to call at any time, any number of
    /// times.
    pub async fn stop_polling(&self) {
        if let Some(task) = self.poll_task.lock().await.take() {
            task.abort();
        }
    }

    pub async fn has_active_poll(&self) -> bool {
        self.poll_task
            .lock()
            .await
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Returns every field to its initial value and cancels any active poll.
    pub async fn reset(&self) {
        self.stop_polling().await;
        self.inner.lock().await.state = WizardState::default();
        let _ = self.events.send(SessionEvent::Reset);
        info!("wizard session reset");
    }

    async fn spawn_motion_poll(self: &Arc<Self>, id: MotionId) {
        let interval = self.inner.lock().await.poll_interval;
        let session = Arc::clone(self);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first interval tick fires immediately; swallow it so the
            // first status check lands one full interval after submission.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match session.api.motion_status(&id).await {
                    Ok(motion) => {
                        if session.on_motion_tick(motion).await {
                            break;
                        }
                    }
                    Err(err) => {
                        warn!(motion_id = %id, "motion status poll failed: {err:#}");
                        session.surface_error("error checking motion status").await;
                        break;
                    }
                }
            }
        });
        self.replace_poll_task(task).await;
    }

    async fn spawn_montage_poll(self: &Arc<Self>, id: MontageId) {
        let interval = self.inner.lock().await.poll_interval;
        let session = Arc::clone(self);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match session.api.montage_status(&id).await {
                    Ok(montage) => {
                        if session.on_montage_tick(montage).await {
                            break;
                        }
                    }
                    Err(err) => {
                        warn!(montage_id = %id, "montage status poll failed: {err:#}");
                        session
                            .surface_error("error checking montage status")
                            .await;
                        break;
                    }
                }
            }
        });
        self.replace_poll_task(task).await;
    }

    /// Applies one motion status response. Returns true when the poll should
    /// stop.
    async fn on_motion_tick(&self, motion: Motion) -> bool {
        match motion.status {
            MotionStatus::Success if motion.output_url().is_some() => {
                {
                    let mut inner = self.inner.lock().await;
                    inner.state.motion_task = Some(motion.clone());
                    inner.state.is_loading = false;
                    advance_to(&mut inner.state, WizardStep::Background);
                }
                info!(motion_id = %motion.id, "motion generation finished");
                let _ = self.events.send(SessionEvent::MotionReady(motion));
                let _ = self
                    .events
                    .send(SessionEvent::StepAdvanced(WizardStep::Background));
                true
            }
            MotionStatus::Success => {
                // Status and output url disagree; trust the url and keep
                // polling rather than advancing onto a missing video.
                warn!(motion_id = %motion.id, "motion reports success without a video url");
                self.inner.lock().await.state.motion_task = Some(motion.clone());
                let _ = self.events.send(SessionEvent::MotionUpdated(motion));
                false
            }
            MotionStatus::Failed => {
                self.inner.lock().await.state.motion_task = Some(motion);
                self.surface_error("motion generation failed").await;
                true
            }
            MotionStatus::Queued | MotionStatus::Processing => {
                self.inner.lock().await.state.motion_task = Some(motion.clone());
                let _ = self.events.send(SessionEvent::MotionUpdated(motion));
                false
            }
        }
    }

    async fn on_montage_tick(&self, montage: Montage) -> bool {
        match montage.status {
            MontageStatus::Ready if montage.output_url().is_some() => {
                {
                    let mut inner = self.inner.lock().await;
                    inner.state.montage_task = Some(montage.clone());
                    inner.state.is_loading = false;
                    advance_to(&mut inner.state, WizardStep::Result);
                }
                info!(montage_id = %montage.id, "montage composition finished");
                let _ = self.events.send(SessionEvent::MontageReady(montage));
                let _ = self
                    .events
                    .send(SessionEvent::StepAdvanced(WizardStep::Result));
                true
            }
            MontageStatus::Ready => {
                warn!(montage_id = %montage.id, "montage reports ready without a video url");
                self.inner.lock().await.state.montage_task = Some(montage.clone());
                let _ = self.events.send(SessionEvent::MontageUpdated(montage));
                false
            }
            MontageStatus::Failed => {
                self.inner.lock().await.state.montage_task = Some(montage);
                self.surface_error("montage generation failed").await;
                true
            }
            MontageStatus::Queued | MontageStatus::Processing => {
                self.inner.lock().await.state.montage_task = Some(montage.clone());
                let _ = self.events.send(SessionEvent::MontageUpdated(montage));
                false
            }
        }
    }

    async fn replace_poll_task(&self, task: JoinHandle<()>) {
        if let Some(previous) = self.poll_task.lock().await.replace(task) {
            previous.abort();
        }
    }

    /// Collapses any failure to the single user-facing message and clears
    /// the loading flag.
    async fn surface_error(&self, message: &str) {
        {
            let mut inner = self.inner.lock().await;
            inner.state.error = Some(message.to_string());
            inner.state.is_loading = false;
        }
        let _ = self.events.send(SessionEvent::Error(message.to_string()));
    }
}

/// The current step only moves forward; expansion follows it.
fn advance_to(state: &mut WizardState, step: WizardStep) {
    if state.current_step.is_at_or_before(step) {
        state.current_step = step;
    }
    state.expanded_step = step;
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
