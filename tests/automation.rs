mod common;

use common::{ok, store, MockBackend};
use serde_json::json;
use social_connect::automation::{
    AutomationMode, AutomationRequest, AutomationService, AutomationStats,
};
use social_connect::seo::{SeoRequest, SeoService};
use social_connect::{AuthError, Platform};

fn request(platform: Platform) -> AutomationRequest {
    AutomationRequest {
        tone: "casual".into(),
        style: "concise".into(),
        platform,
        post_url: None,
    }
}

#[test]
fn start_reports_backend_stats() {
    let mock = MockBackend::start(|_, path, _| match path {
        "/api/v1/comment-automation/start" => ok(json!({
            "success": true,
            "message": "Processed 5 comments",
            "stats": {
                "comments_processed": 5,
                "successful_responses": 5,
                "failed_responses": 0,
            },
        })),
        _ => (404, "{}".into()),
    });
    let service = AutomationService::new(mock.backend(store()));

    let resp = service.start(&request(Platform::Instagram)).unwrap();
    assert!(resp.success);
    assert_eq!(
        resp.stats,
        AutomationStats {
            comments_processed: 5,
            successful_responses: 5,
            failed_responses: 0,
        }
    );

    let sent = mock.last("/api/v1/comment-automation/start").unwrap();
    assert_eq!(sent.method, "POST");
    assert_eq!(
        sent.json(),
        json!({ "tone": "casual", "style": "concise", "platform": "instagram" })
    );
}

#[test]
fn start_surfaces_detail_or_fallback() {
    let mock = MockBackend::start(|_, _, body| {
        if body.contains("twitter") {
            (403, json!({ "detail": "Instagram account not connected" }).to_string())
        } else {
            (500, "gateway exploded".into())
        }
    });
    let service = AutomationService::new(mock.backend(store()));

    assert_eq!(
        service.start(&request(Platform::Twitter)),
        Err(AuthError::Backend {
            status: 403,
            message: "Instagram account not connected".into(),
        })
    );
    assert_eq!(
        service.start(&request(Platform::Instagram)),
        Err(AuthError::Backend {
            status: 500,
            message: "Failed to start automation".into(),
        })
    );
}

#[test]
fn invalid_request_is_rejected_locally() {
    let mock = MockBackend::start(|_, _, _| ok(json!({ "success": true })));
    let service = AutomationService::new(mock.backend(store()));

    let mut blank = request(Platform::Instagram);
    blank.tone = "  ".into();
    assert!(matches!(
        service.start(&blank),
        Err(AuthError::InvalidRequest(_))
    ));
    assert!(matches!(
        service.status(""),
        Err(AuthError::InvalidRequest(_))
    ));
    assert!(mock.requests().is_empty());
}

#[test]
fn youtube_auto_mode_returns_pollable_id() {
    let mock = MockBackend::start(|method, path, _| match (method, path) {
        ("POST", "/api/v1/comment-automation/youtube/start") => ok(json!({
            "success": true,
            "automation_id": "job-42",
        })),
        ("GET", "/api/v1/comment-automation/youtube/status/job-42") => ok(json!({
            "automation_id": "job-42",
            "status": "completed",
            "stats": { "comments_processed": 3, "successful_responses": 2, "failed_responses": 1 },
        })),
        _ => (404, json!({ "detail": "Not found" }).to_string()),
    });
    let service = AutomationService::new(mock.backend(store()));

    let mut req = request(Platform::Youtube);
    req.post_url = Some("https://youtu.be/abc".into());
    let resp = service.start_youtube(&req, AutomationMode::Auto).unwrap();
    let id = resp.automation_id.unwrap();
    assert_eq!(id, "job-42");
    assert_eq!(
        mock.last("/api/v1/comment-automation/youtube/start")
            .unwrap()
            .json(),
        json!({
            "tone": "casual",
            "style": "concise",
            "platform": "youtube",
            "post_url": "https://youtu.be/abc",
            "mode": "auto",
        })
    );

    let status = service.status(&id).unwrap();
    assert!(status.is_finished());
    assert_eq!(status.stats.failed_responses, 1);
}

#[test]
fn youtube_auto_mode_without_id_is_a_decode_error() {
    let mock = MockBackend::start(|_, _, _| ok(json!({ "success": true })));
    let service = AutomationService::new(mock.backend(store()));

    assert!(matches!(
        service.start_youtube(&request(Platform::Youtube), AutomationMode::Auto),
        Err(AuthError::Decode(_))
    ));
    assert!(service
        .start_youtube(&request(Platform::Youtube), AutomationMode::Manual)
        .is_ok());
}

#[test]
fn seo_optimize_posts_content() {
    let mock = MockBackend::start(|_, path, _| match path {
        "/api/v1/seo/optimize" => ok(json!({
            "optimized": "Five ways to grow on LinkedIn",
            "suggestions": ["Lead with a number"],
            "hashtags": ["#growth"],
            "score": 82.5,
        })),
        _ => (404, "{}".into()),
    });
    let service = SeoService::new(mock.backend(store()));

    let resp = service
        .optimize(&SeoRequest {
            content: "ways to grow".into(),
            platform: Platform::Linkedin,
            keywords: vec!["growth".into()],
        })
        .unwrap();
    assert_eq!(resp.optimized_content, "Five ways to grow on LinkedIn");
    assert_eq!(resp.hashtags, vec!["#growth".to_string()]);
    assert_eq!(resp.score, Some(82.5));
    assert_eq!(
        mock.last("/api/v1/seo/optimize").unwrap().json(),
        json!({ "content": "ways to grow", "platform": "linkedin", "keywords": ["growth"] })
    );
}
