use crate::helpers::{TestApp, payload};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, header_exists, method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn should_create_vpc_and_read_it_back() {
    // Arrange
    let app = TestApp::new().await;
    Mock::given(method("POST"))
        .and(path("/api/networking/v4.0/config/vpcs"))
        .and(header_exists("ntnx-request-id"))
        .and(body_partial_json(json!({"name": "v1", "externalSubnets": [{"subnetReference": "s-1"}]})))
        .respond_with(ResponseTemplate::new(202).set_body_json(payload::task_reference("t-1")))
        .expect(1)
        .mount(&app.server)
        .await;
    let mut task = payload::task("t-1", "SUCCEEDED");
    task["data"]["entitiesAffected"] = json!([{"extId": "vpc-1", "rel": "networking:config:vpc"}]);
    Mock::given(method("GET"))
        .and(path("/api/prism/v4.0/config/tasks/t-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(task))
        .mount(&app.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/networking/v4.0/config/vpcs/vpc-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(payload::vpc("vpc-1", "v1")))
        .mount(&app.server)
        .await;

    // Act
    let out = app
        .run(
            "vpc",
            json!({"state": "present", "name": "v1", "external_subnets": [{"subnet_reference": "s-1"}]}),
        )
        .await;

    // Assert
    assert!(out.changed, "{:?}", out);
    assert!(!out.failed);
    assert_eq!(out.ext_id.as_deref(), Some("vpc-1"));
    assert_eq!(out.task_ext_id.as_deref(), Some("t-1"));
    assert_eq!(out.response["name"], "v1");
    assert_eq!(out.response["external_subnets"][0]["subnet_reference"], "s-1");
}

#[tokio::test]
async fn should_skip_update_without_changes() {
    // Arrange
    let app = TestApp::new().await;
    Mock::given(method("GET"))
        .and(path("/api/networking/v4.0/config/vpcs/X"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("ETag", "\"E1\"")
                .set_body_json(payload::vpc("X", "v1")),
        )
        .mount(&app.server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(202))
        .expect(0)
        .mount(&app.server)
        .await;

    // Act
    let out = app.run("vpc", json!({"state": "present", "ext_id": "X", "name": "v1"})).await;

    // Assert
    assert!(!out.changed);
    assert!(out.skipped);
    assert!(!out.failed);
    assert_eq!(out.msg.as_deref(), Some("Nothing to change."));
    assert_eq!(out.task_ext_id, None);
}

#[tokio::test]
async fn should_skip_update_with_current_external_subnets() {
    // Arrange
    let app = TestApp::new().await;
    Mock::given(method("GET"))
        .and(path("/api/networking/v4.0/config/vpcs/X"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("ETag", "\"E1\"")
                .set_body_json(payload::vpc("X", "v1")),
        )
        .mount(&app.server)
        .await;

    // Act
    let out = app
        .run(
            "vpc",
            json!({
                "ext_id": "X",
                "external_subnets": [{"subnet_reference": "s-1", "external_ips": ["10.44.3.199"]}]
            }),
        )
        .await;

    // Assert
    assert!(out.skipped, "{:?}", out);
}

#[tokio::test]
async fn should_report_conflicting_update() {
    // Arrange
    let app = TestApp::new().await;
    Mock::given(method("GET"))
        .and(path("/api/networking/v4.0/config/vpcs/X"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("ETag", "\"E1\"")
                .set_body_json(payload::vpc("X", "v1")),
        )
        .mount(&app.server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/networking/v4.0/config/vpcs/X"))
        .and(header("if-match", "\"E1\""))
        .respond_with(ResponseTemplate::new(412).set_body_json(json!({"message": "ETag mismatch"})))
        .expect(1)
        .mount(&app.server)
        .await;

    // Act
    let out = app.run("vpc", json!({"state": "present", "ext_id": "X", "name": "v2"})).await;

    // Assert
    assert!(out.failed);
    assert!(!out.changed);
    assert_eq!(out.error.as_deref(), Some("ConflictError"));
    assert!(out.msg.unwrap().contains("412"));
}

#[tokio::test]
async fn should_use_etag_from_body_without_header() {
    // Arrange
    let app = TestApp::new().await;
    Mock::given(method("GET"))
        .and(path("/api/networking/v4.0/config/vpcs/X"))
        .respond_with(ResponseTemplate::new(200).set_body_json(payload::vpc("X", "v1")))
        .mount(&app.server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/networking/v4.0/config/vpcs/X"))
        .and(header("if-match", "E-body"))
        .respond_with(ResponseTemplate::new(202).set_body_json(payload::task_reference("t-9")))
        .expect(1)
        .mount(&app.server)
        .await;

    // Act
    let out = app.run("vpc", json!({"state": "absent", "ext_id": "X", "wait": false})).await;

    // Assert
    assert!(out.changed, "{:?}", out);
    assert_eq!(out.task_ext_id.as_deref(), Some("t-9"));
    assert_eq!(out.response, json!({"ext_id": "t-9"}));
}

#[tokio::test]
async fn should_return_built_spec_in_check_mode() {
    // Arrange
    let mut app = TestApp::new().await;
    app.ctx.check_mode = true;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(202))
        .expect(0)
        .mount(&app.server)
        .await;

    // Act
    let out = app.run("vpc", json!({"name": "v1", "vpc_type": "REGULAR"})).await;

    // Assert
    assert!(!out.changed);
    assert!(!out.failed);
    assert_eq!(out.response, json!({"name": "v1", "vpc_type": "REGULAR"}));
}

#[tokio::test]
async fn should_list_vpcs_with_query_parameters() {
    // Arrange
    let app = TestApp::new().await;
    Mock::given(method("GET"))
        .and(path("/api/networking/v4.0/config/vpcs"))
        .and(wiremock::matchers::query_param("$filter", "name eq 'v1'"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [payload::vpc("vpc-1", "v1")["data"].clone()],
            "metadata": {"totalAvailableResults": 1}
        })))
        .expect(1)
        .mount(&app.server)
        .await;

    // Act
    let out = app.run("vpc_info", json!({"filter": "name eq 'v1'"})).await;

    // Assert
    assert!(!out.failed, "{:?}", out);
    assert_eq!(out.response["data"][0]["ext_id"], "vpc-1");
    assert_eq!(out.response["metadata"]["total_available_results"], 1);
}

#[tokio::test]
async fn should_return_empty_info_for_missing_vpc() {
    // Arrange
    let app = TestApp::new().await;
    Mock::given(method("GET"))
        .and(path("/api/networking/v4.0/config/vpcs/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "not found"})))
        .mount(&app.server)
        .await;

    // Act
    let out = app.run("vpc_info", json!({"ext_id": "gone"})).await;

    // Assert
    assert!(!out.failed);
    assert_eq!(out.response, json!({}));
}
