use crate::helpers::TestApp;
use serde_json::json;
use std::io::Write;
use wiremock::matchers::{body_string, header, method, path, query_param};
use wiremock::{Mock, Request, ResponseTemplate};

#[tokio::test]
async fn should_upload_installer_in_chunks() {
    // Arrange
    let app = TestApp::new().await;
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&vec![0x5a; 24 * 1024]).unwrap();
    Mock::given(method("POST"))
        .and(path("/foundation/upload"))
        .and(query_param("filename", "phoenix.iso"))
        .and(query_param("installer_type", "kvm"))
        .and(header("content-type", "application/octet-stream"))
        .and(|request: &Request| request.body.len() == 24 * 1024)
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "phoenix.iso", "in_use": false})))
        .expect(1)
        .mount(&app.server)
        .await;

    // Act
    let out = app
        .run(
            "foundation_image",
            json!({
                "filename": "phoenix.iso",
                "installer_type": "ahv",
                "source": file.path().to_str().unwrap()
            }),
        )
        .await;

    // Assert
    assert!(out.changed, "{:?}", out);
    assert_eq!(out.response, json!({"name": "phoenix.iso", "in_use": false}));
}

#[tokio::test]
async fn should_delete_installer_with_form() {
    // Arrange
    let app = TestApp::new().await;
    Mock::given(method("POST"))
        .and(path("/foundation/delete/"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string("installer_type=kvm&filename=phoenix.iso"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&app.server)
        .await;

    // Act
    let out = app
        .run(
            "foundation_image",
            json!({"state": "absent", "filename": "phoenix.iso", "installer_type": "kvm"}),
        )
        .await;

    // Assert
    assert!(out.changed, "{:?}", out);
    assert_eq!(out.response, json!({}));
}

#[tokio::test]
async fn should_fail_on_missing_source_file() {
    // Arrange
    let app = TestApp::new().await;

    // Act
    let out = app
        .run(
            "foundation_image",
            json!({"filename": "phoenix.iso", "installer_type": "kvm", "source": "/nonexistent/phoenix.iso"}),
        )
        .await;

    // Assert
    assert!(out.failed);
    assert_eq!(out.error.as_deref(), Some("LocalIoError"));
}
