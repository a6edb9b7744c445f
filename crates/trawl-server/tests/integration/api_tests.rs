use std::time::Duration;

use axum::http::StatusCode;
use serde_json::json;
use wiremock::ResponseTemplate;

use crate::integration::common::setup_test_app;

#[tokio::test]
async fn health_returns_200() {
    let app = setup_test_app().await;

    let (status, json) = app.get("/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["jobs"], 0);
    assert_eq!(json["runningJobs"], 0);
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = setup_test_app().await;

    let (status, json) = app.get("/api-docs/openapi.json").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["info"]["title"], "Trawl API");
    assert!(json["paths"]["/v1/jobs/{id}/analyze"].is_object());
}

// ---------------------------------------------------------------------------
// Batch scrape
// ---------------------------------------------------------------------------

#[tokio::test]
async fn scrape_batch_keeps_order_and_isolates_bad_url() {
    let app = setup_test_app().await;
    app.mount_extract_failure("https://bad.test/", "HTTP 404").await;
    app.mount_extract_ok().await;

    let body = json!({
        "targets": [
            { "url": "https://one.test/" },
            { "url": "https://bad.test/" },
            { "url": "https://three.test/", "selectors": [
                { "id": "t", "selector": "h1", "name": "title", "type": "text" }
            ]}
        ]
    });
    let (status, json) = app.post("/v1/scrape", &body).await;

    assert_eq!(status, StatusCode::OK, "{json}");
    let results = json.as_array().unwrap();
    assert_eq!(results.len(), 3);

    assert_eq!(results[0]["url"], "https://one.test/");
    assert_eq!(results[0]["success"], true);
    assert_eq!(results[0]["data"]["title"], "Example Domain");

    assert_eq!(results[1]["url"], "https://bad.test/");
    assert_eq!(results[1]["success"], false);
    assert_eq!(results[1]["error"], "HTTP 404");
    assert_eq!(results[1]["metadata"]["statusCode"], 404);

    assert_eq!(results[2]["url"], "https://three.test/");
    assert_eq!(results[2]["success"], true);
}

#[tokio::test]
async fn scrape_with_empty_targets_returns_empty_list() {
    let app = setup_test_app().await;

    let (status, json) = app.post("/v1/scrape", &json!({ "targets": [] })).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!([]));
}

#[tokio::test]
async fn scrape_with_invalid_body_returns_400() {
    let app = setup_test_app().await;

    let (status, json) = app.post("/v1/scrape", &json!({ "targets": "nope" })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid_input");
}

#[tokio::test]
async fn scrape_reports_unreachable_worker_per_target() {
    let app = setup_test_app().await;
    // Nothing mounted: wiremock answers 404 for every call.

    let (status, json) = app
        .post("/v1/scrape", &json!({ "targets": [{ "url": "https://one.test/" }] }))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json[0]["success"], false);
    assert!(
        json[0]["error"]
            .as_str()
            .unwrap()
            .starts_with("Extraction worker error (HTTP 404)")
    );
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn start_job_and_poll_to_completion() {
    let app = setup_test_app().await;
    app.mount_page(&["Hello", "World"]).await;

    let job_id = app.start_job(json!({ "url": "https://example.com" })).await;
    let job = app.wait_for_terminal(&job_id).await;

    assert_eq!(job["id"], job_id.as_str());
    assert_eq!(job["status"], "completed");
    assert_eq!(job["progress"], 100);
    assert_eq!(job["data"]["text"], json!(["Hello", "World"]));
    assert_eq!(job["metadata"]["title"], "Example Domain");
    assert!(job.get("aiAnalysis").is_none());
    assert!(job["completedAt"].is_string());
}

#[tokio::test]
async fn start_job_response_is_accepted_and_in_progress() {
    let app = setup_test_app().await;
    app.mount_slow_page(Duration::from_millis(200)).await;

    let (status, json) = app
        .post("/v1/jobs", &json!({ "url": "https://example.com" }))
        .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(json["status"], "in-progress");
    let job_id = json["jobId"].as_str().unwrap();

    let (status, job) = app.get(&format!("/v1/jobs/{job_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(job["status"], "in-progress");
    assert_eq!(job["progress"], 10);
}

#[tokio::test]
async fn job_with_ai_analysis_attaches_result() {
    let app = setup_test_app().await;
    app.mount_page(&["Rust is fast."]).await;
    app.mount_analysis(ResponseTemplate::new(200).set_body_json(json!({
        "summary": "Claims Rust is fast.",
        "sentiment": { "label": "positive", "score": 0.8 },
        "keywords": ["rust"]
    })))
    .await;

    let job_id = app
        .start_job(json!({
            "url": "https://example.com",
            "aiOptions": { "enabled": true }
        }))
        .await;
    let job = app.wait_for_terminal(&job_id).await;

    assert_eq!(job["status"], "completed");
    assert_eq!(job["progress"], 100);
    assert_eq!(job["aiAnalysis"]["summary"], "Claims Rust is fast.");
    assert_eq!(job["aiAnalysis"]["sentiment"]["label"], "positive");
}

#[tokio::test]
async fn worker_failure_fails_the_job() {
    let app = setup_test_app().await;
    // No /scrape mock: the worker answers 404.

    let job_id = app.start_job(json!({ "url": "https://example.com" })).await;
    let job = app.wait_for_terminal(&job_id).await;

    assert_eq!(job["status"], "failed");
    assert_eq!(job["progress"], 0);
    assert!(job["error"].as_str().unwrap().contains("HTTP 404"));
}

#[tokio::test]
async fn analysis_failure_fails_the_job() {
    let app = setup_test_app().await;
    app.mount_page(&["text"]).await;
    app.mount_analysis(ResponseTemplate::new(500).set_body_json(json!({ "error": "model down" })))
        .await;

    let job_id = app
        .start_job(json!({
            "url": "https://example.com",
            "aiOptions": { "enabled": true }
        }))
        .await;
    let job = app.wait_for_terminal(&job_id).await;

    assert_eq!(job["status"], "failed");
    assert_eq!(job["progress"], 0);
    assert_eq!(job["error"], "Analysis error (HTTP 500): model down");
}

#[tokio::test]
async fn start_job_with_invalid_url_returns_400() {
    let app = setup_test_app().await;

    let (status, json) = app.post("/v1/jobs", &json!({ "url": "not a url" })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid_input");
    assert_eq!(app.state.registry().len(), 0);
}

#[tokio::test]
async fn start_job_without_url_returns_400() {
    let app = setup_test_app().await;

    let (status, _) = app.post("/v1/jobs", &json!({ "selectors": [] })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn get_unknown_job_returns_404() {
    let app = setup_test_app().await;

    let (status, json) = app
        .get("/v1/jobs/00000000-0000-4000-8000-000000000000")
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "not_found");
}

#[tokio::test]
async fn list_jobs_filters_by_status() {
    let app = setup_test_app().await;
    app.mount_page(&["text"]).await;

    let first = app.start_job(json!({ "url": "https://one.example.com" })).await;
    let second = app.start_job(json!({ "url": "https://two.example.com" })).await;
    app.wait_for_terminal(&first).await;
    app.wait_for_terminal(&second).await;

    let (status, json) = app.get("/v1/jobs").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 2);
    assert_eq!(json["jobs"][0]["id"], first.as_str());
    assert_eq!(json["jobs"][1]["id"], second.as_str());

    let (_, json) = app.get("/v1/jobs?status=completed").await;
    assert_eq!(json["total"], 2);

    let (_, json) = app.get("/v1/jobs?status=failed").await;
    assert_eq!(json["total"], 0);
    assert_eq!(json["jobs"], json!([]));
}

#[tokio::test]
async fn list_jobs_with_unknown_status_returns_400() {
    let app = setup_test_app().await;

    let (status, json) = app.get("/v1/jobs?status=running").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["message"].as_str().unwrap().contains("running"));
}

#[tokio::test]
async fn delete_job_removes_it() {
    let app = setup_test_app().await;
    app.mount_page(&["text"]).await;

    let job_id = app.start_job(json!({ "url": "https://example.com" })).await;
    app.wait_for_terminal(&job_id).await;

    let (status, _) = app.delete(&format!("/v1/jobs/{job_id}")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.get(&format!("/v1/jobs/{job_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.delete(&format!("/v1/jobs/{job_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_running_job_cancels_it() {
    let app = setup_test_app().await;
    app.mount_slow_page(Duration::from_secs(5)).await;

    let job_id = app.start_job(json!({ "url": "https://example.com" })).await;
    let (status, _) = app.delete(&format!("/v1/jobs/{job_id}")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, health) = app.get("/health").await;
    assert_eq!(health["jobs"], 0);
    assert_eq!(health["runningJobs"], 0);
}

// ---------------------------------------------------------------------------
// Standalone analysis
// ---------------------------------------------------------------------------

#[tokio::test]
async fn analyze_completed_job_returns_and_attaches_result() {
    let app = setup_test_app().await;
    app.mount_page(&["Rust is fast."]).await;
    app.mount_analysis(ResponseTemplate::new(200).set_body_json(json!({
        "keywords": ["rust", "speed"],
        "entities": [{ "name": "Rust", "type": "language" }],
        "readingLevel": "easy"
    })))
    .await;

    let job_id = app.start_job(json!({ "url": "https://example.com" })).await;
    app.wait_for_terminal(&job_id).await;

    let (status, json) = app
        .post(&format!("/v1/jobs/{job_id}/analyze"), &json!({ "sentiment": false }))
        .await;

    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["keywords"], json!(["rust", "speed"]));
    assert_eq!(json["entities"][0]["type"], "language");
    assert_eq!(json["readingLevel"], "easy");

    let (_, job) = app.get(&format!("/v1/jobs/{job_id}")).await;
    assert_eq!(job["status"], "completed");
    assert_eq!(job["progress"], 100);
    assert_eq!(job["aiAnalysis"]["keywords"][0], "rust");
}

#[tokio::test]
async fn analyze_unknown_job_returns_404() {
    let app = setup_test_app().await;

    let (status, _) = app
        .post(
            "/v1/jobs/00000000-0000-4000-8000-000000000000/analyze",
            &json!({}),
        )
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn analyze_running_job_returns_409() {
    let app = setup_test_app().await;
    app.mount_slow_page(Duration::from_secs(2)).await;

    let job_id = app.start_job(json!({ "url": "https://example.com" })).await;
    let (status, json) = app
        .post(&format!("/v1/jobs/{job_id}/analyze"), &json!({}))
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "conflict");
}

#[tokio::test]
async fn analyze_worker_error_returns_502() {
    let app = setup_test_app().await;
    app.mount_page(&["text"]).await;
    app.mount_analysis(ResponseTemplate::new(503).set_body_string("overloaded"))
        .await;

    let job_id = app.start_job(json!({ "url": "https://example.com" })).await;
    app.wait_for_terminal(&job_id).await;

    let (status, json) = app
        .post(&format!("/v1/jobs/{job_id}/analyze"), &json!({}))
        .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["error"], "analysis_error");

    let (_, job) = app.get(&format!("/v1/jobs/{job_id}")).await;
    assert_eq!(job["status"], "completed");
    assert!(job.get("aiAnalysis").is_none());
}
