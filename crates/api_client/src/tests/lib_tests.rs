use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use axum::{
    extract::{Multipart, Path as UrlPath, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use shared::{
    domain::MotionStatus,
    error::ErrorCode,
};
use tokio::{net::TcpListener, sync::Mutex};

use super::*;

#[derive(Clone, Default)]
struct MockState {
    upload_hits: Arc<AtomicUsize>,
    deleted: Arc<Mutex<Vec<String>>>,
    uploaded_parts: Arc<Mutex<Vec<(String, String, String)>>>,
}

fn sample_avatar(id: &str) -> Avatar {
    Avatar {
        id: AvatarId::new(id),
        name: "Anna".to_string(),
        image_url: format!("https://cdn.example/{id}.png"),
        preview_url: None,
    }
}

async fn handle_list_avatars() -> Json<Vec<Avatar>> {
    Json(vec![sample_avatar("a-1"), sample_avatar("a-2")])
}

async fn handle_upload_avatar(
    State(state): State<MockState>,
    mut multipart: Multipart,
) -> Json<Avatar> {
    state.upload_hits.fetch_add(1, Ordering::SeqCst);
    while let Some(field) = multipart.next_field().await.expect("multipart field") {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        let _ = field.bytes().await.expect("field bytes");
        state
            .uploaded_parts
            .lock()
            .await
            .push((name, file_name, content_type));
    }
    Json(sample_avatar("a-new"))
}

async fn handle_upload_reference(
    State(state): State<MockState>,
    mut multipart: Multipart,
) -> Json<Reference> {
    state.upload_hits.fetch_add(1, Ordering::SeqCst);
    while let Some(field) = multipart.next_field().await.expect("multipart field") {
        let _ = field.bytes().await.expect("field bytes");
    }
    Json(Reference {
        id: ReferenceId::new("r-new"),
        name: String::new(),
        label: Some("Waving Hello".to_string()),
        preview_url: None,
        video_url: Some("https://cdn.example/r-new.mp4".to_string()),
        thumbnail_url: None,
        duration: None,
    })
}

async fn handle_create_motion(Json(body): Json<CreateMotionRequest>) -> Json<Motion> {
    Json(Motion {
        id: MotionId::new("mo-1"),
        status: MotionStatus::Queued,
        avatar_id: body.avatar_id,
        reference_id: body.reference_id,
        motion_video_url: None,
        motion_thumbnail_url: None,
    })
}

async fn handle_motion_status(UrlPath(id): UrlPath<String>) -> Json<Motion> {
    Json(Motion {
        id: MotionId::new(id),
        status: MotionStatus::Success,
        avatar_id: AvatarId::new("a-1"),
        reference_id: ReferenceId::new("r-1"),
        motion_video_url: Some("https://cdn.example/mo-1.mp4".to_string()),
        motion_thumbnail_url: None,
    })
}

async fn handle_delete_background(
    State(state): State<MockState>,
    UrlPath(id): UrlPath<String>,
) -> StatusCode {
    state.deleted.lock().await.push(id);
    StatusCode::NO_CONTENT
}

async fn handle_list_montages() -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ApiError::new(ErrorCode::Internal, "montage pipeline offline")),
    )
}

async fn spawn_mock_api() -> Result<(HttpReactionApi, MockState)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = MockState::default();
    let app = Router::new()
        .route("/avatars", get(handle_list_avatars).post(handle_upload_avatar))
        .route("/references", post(handle_upload_reference))
        .route("/motions", post(handle_create_motion))
        .route("/motions/:id", get(handle_motion_status))
        .route("/backgrounds/:id", delete(handle_delete_background))
        .route("/montages", get(handle_list_montages))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((HttpReactionApi::new(format!("http://{addr}"))?, state))
}

fn mp4_payload() -> MediaPayload {
    MediaPayload::new(
        "clip.mp4",
        "video/mp4".parse().expect("mime"),
        b"not-really-a-video".to_vec(),
    )
}

#[tokio::test]
async fn lists_and_parses_avatars() {
    let (api, _state) = spawn_mock_api().await.expect("spawn mock");
    let avatars = api.list_avatars().await.expect("list");
    assert_eq!(avatars.len(), 2);
    assert_eq!(avatars[0].id, AvatarId::new("a-1"));
}

#[tokio::test]
async fn create_motion_round_trips_selected_ids() {
    let (api, _state) = spawn_mock_api().await.expect("spawn mock");
    let motion = api
        .create_motion(&AvatarId::new("a-7"), &ReferenceId::new("r-3"))
        .await
        .expect("create");
    assert_eq!(motion.status, MotionStatus::Queued);
    assert_eq!(motion.avatar_id, AvatarId::new("a-7"));
    assert_eq!(motion.reference_id, ReferenceId::new("r-3"));
}

#[tokio::test]
async fn motion_status_fetches_by_id() {
    let (api, _state) = spawn_mock_api().await.expect("spawn mock");
    let motion = api
        .motion_status(&MotionId::new("mo-42"))
        .await
        .expect("status");
    assert_eq!(motion.id, MotionId::new("mo-42"));
    assert!(motion.is_complete());
}

#[tokio::test]
async fn delete_background_issues_delete_by_id() {
    let (api, state) = spawn_mock_api().await.expect("spawn mock");
    api.delete_background(&BackgroundId::new("bg-9"))
        .await
        .expect("delete");
    assert_eq!(state.deleted.lock().await.as_slice(), ["bg-9".to_string()]);
}

#[tokio::test]
async fn structured_error_body_is_surfaced() {
    let (api, _state) = spawn_mock_api().await.expect("spawn mock");
    let err = api.list_montages().await.expect_err("must fail");
    let text = err.to_string();
    assert!(
        text.contains("montage pipeline offline"),
        "unexpected error: {text}"
    );
}

#[tokio::test]
async fn upload_avatar_posts_file_part() {
    let (api, state) = spawn_mock_api().await.expect("spawn mock");
    let payload = MediaPayload::new("anna.png", mime::IMAGE_PNG, vec![0x89, 0x50, 0x4e, 0x47]);
    let avatar = api.upload_avatar(payload).await.expect("upload");
    assert_eq!(avatar.id, AvatarId::new("a-new"));

    let parts = state.uploaded_parts.lock().await;
    assert_eq!(parts.len(), 1);
    assert_eq!(parts[0].0, "file");
    assert_eq!(parts[0].1, "anna.png");
    assert_eq!(parts[0].2, "image/png");
}

#[tokio::test]
async fn rejected_uploads_never_reach_the_network() {
    let (api, state) = spawn_mock_api().await.expect("spawn mock");

    let wrong_type = MediaPayload::new("clip.txt", mime::TEXT_PLAIN, b"hello".to_vec());
    let err = api
        .upload_reference(wrong_type, "Waving Hello")
        .await
        .expect_err("must fail validation");
    assert!(err.is::<UploadValidationError>());

    let missing_label = api
        .upload_reference(mp4_payload(), "   ")
        .await
        .expect_err("must fail validation");
    assert_eq!(
        missing_label.downcast_ref::<UploadValidationError>(),
        Some(&UploadValidationError::MissingLabel)
    );

    assert_eq!(state.upload_hits.load(Ordering::SeqCst), 0);
}

#[test]
fn normalize_base_url_trims_trailing_slash() {
    assert_eq!(
        normalize_base_url("https://reaction.example/avatar/").expect("normalize"),
        "https://reaction.example/avatar"
    );
}

#[test]
fn normalize_base_url_rejects_non_http_schemes() {
    assert!(normalize_base_url("ftp://reaction.example").is_err());
    assert!(normalize_base_url("not a url").is_err());
}
