use crate::helpers::{TestApp, payload};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn should_create_volume_group_from_completion_details() {
    // Arrange
    let app = TestApp::new().await;
    Mock::given(method("POST"))
        .and(path("/api/volumes/v4.0/config/volume-groups"))
        .respond_with(ResponseTemplate::new(202).set_body_json(payload::task_reference("t-1")))
        .mount(&app.server)
        .await;
    let mut task = payload::task("t-1", "SUCCEEDED");
    task["data"]["completionDetails"] = json!([{"name": "volumeGroupExtIds", "value": "vg-1"}]);
    Mock::given(method("GET"))
        .and(path("/api/prism/v4.0/config/tasks/t-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(task))
        .mount(&app.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/volumes/v4.0/config/volume-groups/vg-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"extId": "vg-1", "name": "vg", "sharingStatus": "SHARED"}
        })))
        .mount(&app.server)
        .await;

    // Act
    let out = app.run("volume_group", json!({"name": "vg", "sharing_status": "SHARED"})).await;

    // Assert
    assert!(out.changed, "{:?}", out);
    assert_eq!(out.ext_id.as_deref(), Some("vg-1"));
    assert_eq!(out.response["sharing_status"], "SHARED");
}

#[tokio::test]
async fn should_time_out_waiting_for_running_task() {
    // Arrange
    let app = TestApp::new().await;
    Mock::given(method("POST"))
        .and(path("/api/volumes/v4.0/config/volume-groups"))
        .respond_with(ResponseTemplate::new(202).set_body_json(payload::task_reference("t-2")))
        .mount(&app.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/prism/v4.0/config/tasks/t-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(payload::task("t-2", "RUNNING")))
        .expect(3)
        .mount(&app.server)
        .await;

    // Act
    let out = app.run("volume_group", json!({"name": "vg", "timeout": 2})).await;

    // Assert
    assert!(out.failed);
    assert_eq!(out.error.as_deref(), Some("TimeoutError"));
    assert_eq!(out.task_ext_id.as_deref(), Some("t-2"));
    assert_eq!(out.response["status"], "RUNNING");
    assert_eq!(out.response["progress_percentage"], 40);
}
