//! API integration tests for the session server.
//!
//! Tests verify:
//! - Session lifecycle (open, inspect, list, delete)
//! - Registration through the API and composed frames
//! - PNG slice and image endpoints, the live view and exports
//! - Error cases and their HTTP status codes
//! - Isolation between sessions

use std::path::Path;

use axum::http::StatusCode;
use axum::Router;
use serde_json::json;
use tower::ServiceExt;

use corview::export::Artifact;
use corview::registration::ResolutionPolicy;
use corview::{create_router, RouterConfig};

use super::test_utils::{
    body_bytes, body_json, delete, get, is_png, post_json, write_image, write_stack,
    StackBuilder,
};

fn router(export_dir: &Path) -> Router {
    create_router(
        RouterConfig::new()
            .with_tracing(false)
            .with_export_dir(export_dir),
    )
}

/// Open a session over `volume` and return its id.
async fn open_session(router: &Router, volume: &Path) -> String {
    let response = router
        .clone()
        .oneshot(post_json("/sessions", json!({ "volume": volume })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["id"].as_str().unwrap().to_string()
}

async fn register(router: &Router, session: &str, image: &Path, position: i64) -> StatusCode {
    router
        .clone()
        .oneshot(post_json(
            &format!("/sessions/{}/registrations", session),
            json!({ "image": image, "position": position }),
        ))
        .await
        .unwrap()
        .status()
}

// =============================================================================
// Health and Sessions
// =============================================================================

#[tokio::test]
async fn test_health() {
    let dir = tempfile::tempdir().unwrap();
    let response = router(dir.path()).oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_session_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let volume = write_stack(dir.path(), "femur.tif", 12, 8, 6);
    let router = router(dir.path());

    let response = router
        .clone()
        .oneshot(post_json("/sessions", json!({ "volume": volume })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let info = body_json(response).await;
    let id = info["id"].as_str().unwrap().to_string();
    assert_eq!(info["volume"], "femur.tif");
    assert_eq!(info["slice_count"], 12);
    assert_eq!(info["width"], 8);
    assert_eq!(info["height"], 6);
    assert_eq!(info["registrations"], 0);
    assert_eq!(info["policy"], "exact");

    let listed = body_json(router.clone().oneshot(get("/sessions")).await.unwrap()).await;
    assert_eq!(listed["sessions"], json!([id.clone()]));

    let fetched = router
        .clone()
        .oneshot(get(&format!("/sessions/{}", id)))
        .await
        .unwrap();
    assert_eq!(fetched.status(), StatusCode::OK);

    let deleted = router
        .clone()
        .oneshot(delete(&format!("/sessions/{}", id)))
        .await
        .unwrap();
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

    let gone = router
        .clone()
        .oneshot(get(&format!("/sessions/{}", id)))
        .await
        .unwrap();
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
    let error = body_json(gone).await;
    assert_eq!(error["error"], "not_found");
    assert_eq!(error["status"], 404);
}

#[tokio::test]
async fn test_open_session_errors() {
    let dir = tempfile::tempdir().unwrap();
    let router = router(dir.path());

    let missing = router
        .clone()
        .oneshot(post_json("/sessions", json!({ "volume": "/no/such/stack.tif" })))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let text = dir.path().join("notes.txt");
    std::fs::write(&text, "not a volume").unwrap();
    let unsupported = router
        .clone()
        .oneshot(post_json("/sessions", json!({ "volume": text })))
        .await
        .unwrap();
    assert_eq!(unsupported.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body_json(unsupported).await["error"], "unsupported_volume");

    let huge = dir.path().join("huge.tif");
    std::fs::write(
        &huge,
        StackBuilder::new()
            .gray8_claiming(0xFFFF_FFFF, 0xFFFF_FFFF, vec![0])
            .build(),
    )
    .unwrap();
    let malformed = router
        .clone()
        .oneshot(post_json("/sessions", json!({ "volume": huge })))
        .await
        .unwrap();
    assert_eq!(malformed.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

// =============================================================================
// Registrations and Frames
// =============================================================================

#[tokio::test]
async fn test_register_and_compose_frames() {
    let dir = tempfile::tempdir().unwrap();
    let router = router(dir.path());
    let session = open_session(&router, &write_stack(dir.path(), "ct.tif", 10, 4, 4)).await;

    let image = write_image(dir.path(), "section_12.png", [200, 100, 50]);
    let response = router
        .clone()
        .oneshot(post_json(
            &format!("/sessions/{}/registrations", session),
            json!({ "image": image, "position": 7 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let added = body_json(response).await;
    assert_eq!(added["filename"], "section_12.png");
    assert_eq!(added["position"], 7);
    let entry_id = added["id"].as_str().unwrap().to_string();

    let listing = body_json(
        router
            .clone()
            .oneshot(get(&format!("/sessions/{}/registrations", session)))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(listing.as_array().unwrap().len(), 1);
    assert_eq!(listing[0]["id"], entry_id);

    let hit = body_json(
        router
            .clone()
            .oneshot(get(&format!("/sessions/{}/frames/7", session)))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(hit["index"], 7);
    assert_eq!(hit["slice_title"], "CT slice 7");
    assert_eq!(hit["slider"]["max"], 9);
    assert_eq!(hit["image"]["kind"], "registered");
    assert_eq!(hit["image"]["id"], entry_id);
    assert_eq!(hit["image"]["caption"], "Histology section_12.png");

    let miss = body_json(
        router
            .clone()
            .oneshot(get(&format!("/sessions/{}/frames/8", session)))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(miss["image"]["kind"], "placeholder");
}

#[tokio::test]
async fn test_register_invalid_position() {
    let dir = tempfile::tempdir().unwrap();
    let router = router(dir.path());
    let session = open_session(&router, &write_stack(dir.path(), "ct.tif", 10, 2, 2)).await;
    let image = write_image(dir.path(), "h.png", [0, 0, 0]);

    for position in [-1, 10, 12] {
        assert_eq!(
            register(&router, &session, &image, position).await,
            StatusCode::BAD_REQUEST
        );
    }

    let listing = body_json(
        router
            .clone()
            .oneshot(get(&format!("/sessions/{}/registrations", session)))
            .await
            .unwrap(),
    )
    .await;
    assert!(listing.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_register_bad_images() {
    let dir = tempfile::tempdir().unwrap();
    let router = router(dir.path());
    let session = open_session(&router, &write_stack(dir.path(), "ct.tif", 4, 2, 2)).await;

    assert_eq!(
        register(&router, &session, &dir.path().join("absent.png"), 1).await,
        StatusCode::NOT_FOUND
    );

    let garbage = dir.path().join("garbage.png");
    std::fs::write(&garbage, b"not an image").unwrap();
    assert_eq!(
        register(&router, &session, &garbage, 1).await,
        StatusCode::UNPROCESSABLE_ENTITY
    );
}

#[tokio::test]
async fn test_clear_registrations() {
    let dir = tempfile::tempdir().unwrap();
    let router = router(dir.path());
    let session = open_session(&router, &write_stack(dir.path(), "ct.tif", 5, 2, 2)).await;
    let image = write_image(dir.path(), "h.png", [0, 0, 0]);
    register(&router, &session, &image, 1).await;
    register(&router, &session, &image, 3).await;

    let cleared = router
        .clone()
        .oneshot(delete(&format!("/sessions/{}/registrations", session)))
        .await
        .unwrap();
    assert_eq!(cleared.status(), StatusCode::OK);
    assert_eq!(body_json(cleared).await["removed"], 2);

    let frame = body_json(
        router
            .clone()
            .oneshot(get(&format!("/sessions/{}/frames/1", session)))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(frame["image"]["kind"], "placeholder");
}

#[tokio::test]
async fn test_frame_out_of_range() {
    let dir = tempfile::tempdir().unwrap();
    let router = router(dir.path());
    let session = open_session(&router, &write_stack(dir.path(), "ct.tif", 3, 2, 2)).await;

    let response = router
        .clone()
        .oneshot(get(&format!("/sessions/{}/frames/3", session)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "invalid_index");
}

// =============================================================================
// PNG Endpoints and Live View
// =============================================================================

#[tokio::test]
async fn test_slice_png() {
    let dir = tempfile::tempdir().unwrap();
    let router = router(dir.path());
    let session = open_session(&router, &write_stack(dir.path(), "ct.tif", 3, 5, 4)).await;
    let uri = format!("/sessions/{}/slices/2.png", session);

    let response = router.clone().oneshot(get(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("content-type").unwrap(), "image/png");
    assert!(response
        .headers()
        .get("cache-control")
        .unwrap()
        .to_str()
        .unwrap()
        .contains("max-age=3600"));
    let first = body_bytes(response).await;
    assert!(is_png(&first));

    let decoded = image::load_from_memory(&first).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (5, 4));

    // Second request is served from the cache with identical bytes
    let second = body_bytes(router.clone().oneshot(get(&uri)).await.unwrap()).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_slice_png_errors() {
    let dir = tempfile::tempdir().unwrap();
    let router = router(dir.path());
    let session = open_session(&router, &write_stack(dir.path(), "ct.tif", 3, 2, 2)).await;

    for (uri, status) in [
        (format!("/sessions/{}/slices/3.png", session), StatusCode::BAD_REQUEST),
        (format!("/sessions/{}/slices/x.png", session), StatusCode::BAD_REQUEST),
        (format!("/sessions/{}/slices/1.jpg", session), StatusCode::BAD_REQUEST),
        ("/sessions/nope/slices/1.png".to_string(), StatusCode::NOT_FOUND),
    ] {
        let response = router.clone().oneshot(get(&uri)).await.unwrap();
        assert_eq!(response.status(), status, "{}", uri);
    }
}

#[tokio::test]
async fn test_image_png() {
    let dir = tempfile::tempdir().unwrap();
    let router = router(dir.path());
    let session = open_session(&router, &write_stack(dir.path(), "ct.tif", 3, 2, 2)).await;
    let image = write_image(dir.path(), "h.png", [10, 20, 30]);

    let added = body_json(
        router
            .clone()
            .oneshot(post_json(
                &format!("/sessions/{}/registrations", session),
                json!({ "image": image, "position": 1 }),
            ))
            .await
            .unwrap(),
    )
    .await;
    let entry_id = added["id"].as_str().unwrap();

    let response = router
        .clone()
        .oneshot(get(&format!("/sessions/{}/images/{}.png", session, entry_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let decoded = image::load_from_memory(&body_bytes(response).await)
        .unwrap()
        .to_rgb8();
    assert_eq!(decoded.get_pixel(0, 0).0, [10, 20, 30]);

    let unknown = router
        .clone()
        .oneshot(get(&format!("/sessions/{}/images/1-999.png", session)))
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

    let malformed = router
        .clone()
        .oneshot(get(&format!("/sessions/{}/images/abc.png", session)))
        .await
        .unwrap();
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_live_view_page() {
    let dir = tempfile::tempdir().unwrap();
    let router = router(dir.path());
    let session = open_session(&router, &write_stack(dir.path(), "femur.tif", 6, 2, 2)).await;

    let response = router
        .clone()
        .oneshot(get(&format!("/sessions/{}/view", session)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/html"));

    let html = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(html.contains("femur.tif"));
    assert!(html.contains(r#"max="5""#));
    assert!(html.contains("fetch('frames/' + index)"));
}

// =============================================================================
// Export
// =============================================================================

#[tokio::test]
async fn test_export_via_api() {
    let dir = tempfile::tempdir().unwrap();
    let exports = tempfile::tempdir().unwrap();
    let router = router(exports.path());
    let session = open_session(&router, &write_stack(dir.path(), "ct.tif", 4, 3, 3)).await;
    let image = write_image(dir.path(), "h.png", [0, 0, 0]);
    register(&router, &session, &image, 2).await;

    let response = router
        .clone()
        .oneshot(post_json(
            &format!("/sessions/{}/export", session),
            json!({ "output": "sample", "title": "Sample 3" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let summary = body_json(response).await;
    assert_eq!(summary["slice_count"], 4);
    assert_eq!(summary["image_count"], 1);

    let path = exports.path().join("sample.html");
    assert_eq!(summary["path"], json!(path));
    let artifact = Artifact::read(&path).unwrap();
    assert_eq!(artifact.payload.title, "Sample 3");
    assert_eq!(artifact.payload.resolve(2).unwrap().filename, "h.png");
    assert!(artifact.payload.resolve(1).is_none());
}

#[tokio::test]
async fn test_export_default_name_and_policy() {
    let dir = tempfile::tempdir().unwrap();
    let exports = tempfile::tempdir().unwrap();
    let router = create_router(
        RouterConfig::new()
            .with_tracing(false)
            .with_export_dir(exports.path())
            .with_policy(ResolutionPolicy::NearestBelow),
    );
    let session = open_session(&router, &write_stack(dir.path(), "ct.tif", 4, 2, 2)).await;
    register(&router, &session, &write_image(dir.path(), "h.png", [0, 0, 0]), 1).await;

    let request = axum::http::Request::builder()
        .method("POST")
        .uri(format!("/sessions/{}/export", session))
        .body(axum::body::Body::empty())
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let artifact = Artifact::read(exports.path().join("3DXRH-Vis.html")).unwrap();
    assert_eq!(artifact.payload.policy, "nearest-below");
    assert!(artifact.payload.resolve(0).is_none());
    assert!(artifact.payload.resolve(3).is_some());
}

#[tokio::test]
async fn test_export_rejects_escaping_paths() {
    let dir = tempfile::tempdir().unwrap();
    let exports = tempfile::tempdir().unwrap();
    let router = router(exports.path());
    let session = open_session(&router, &write_stack(dir.path(), "ct.tif", 2, 2, 2)).await;

    for output in ["../escape.html", "/tmp/escape.html"] {
        let response = router
            .clone()
            .oneshot(post_json(
                &format!("/sessions/{}/export", session),
                json!({ "output": output }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", output);
    }
}

#[tokio::test]
async fn test_export_too_large() {
    let dir = tempfile::tempdir().unwrap();
    let exports = tempfile::tempdir().unwrap();
    let router = create_router(
        RouterConfig::new()
            .with_tracing(false)
            .with_export_dir(exports.path())
            .with_max_artifact_bytes(512),
    );
    let session = open_session(&router, &write_stack(dir.path(), "ct.tif", 4, 8, 8)).await;

    let response = router
        .clone()
        .oneshot(post_json(
            &format!("/sessions/{}/export", session),
            json!({ "output": "big.html" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["error"], "artifact_too_large");
    assert!(!exports.path().join("big.html").exists());
}

// =============================================================================
// Isolation
// =============================================================================

#[tokio::test]
async fn test_session_ids_not_reused_across_servers() {
    let dir = tempfile::tempdir().unwrap();
    let before = router(dir.path());
    let after = router(dir.path());

    let first = open_session(&before, &write_stack(dir.path(), "old.tif", 3, 2, 2)).await;
    let second = open_session(&after, &write_stack(dir.path(), "new.tif", 3, 4, 4)).await;
    assert_ne!(first, second);

    // The old slice URL does not resolve on the new server
    let stale = after
        .clone()
        .oneshot(get(&format!("/sessions/{}/slices/0.png", first)))
        .await
        .unwrap();
    assert_eq!(stale.status(), StatusCode::NOT_FOUND);

    let fresh = after
        .clone()
        .oneshot(get(&format!("/sessions/{}/slices/0.png", second)))
        .await
        .unwrap();
    let decoded = image::load_from_memory(&body_bytes(fresh).await).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (4, 4));
}

#[tokio::test]
async fn test_sessions_are_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let router = router(dir.path());
    let volume = write_stack(dir.path(), "ct.tif", 6, 3, 3);
    let first = open_session(&router, &volume).await;
    let second = open_session(&router, &volume).await;
    assert_ne!(first, second);

    let image = write_image(dir.path(), "h.png", [0, 0, 0]);
    assert_eq!(register(&router, &first, &image, 4).await, StatusCode::CREATED);

    let frame = |session: String| {
        let router = router.clone();
        async move {
            body_json(
                router
                    .oneshot(get(&format!("/sessions/{}/frames/4", session)))
                    .await
                    .unwrap(),
            )
            .await
        }
    };
    assert_eq!(frame(first.clone()).await["image"]["kind"], "registered");
    assert_eq!(frame(second.clone()).await["image"]["kind"], "placeholder");

    // Deleting one session leaves the other untouched
    router
        .clone()
        .oneshot(delete(&format!("/sessions/{}", first)))
        .await
        .unwrap();
    let remaining = body_json(router.clone().oneshot(get("/sessions")).await.unwrap()).await;
    assert_eq!(remaining["sessions"], json!([second.clone()]));
    assert_eq!(frame(second).await["slice_count"], 6);
}
