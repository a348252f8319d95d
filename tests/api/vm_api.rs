use crate::helpers::{TestApp, payload};
use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, Request, Respond, ResponseTemplate};

/// Serves `total` VMs from the v3 list endpoint, page by page.
struct VmPages {
    total: u64,
}

impl Respond for VmPages {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).unwrap();
        let length = body["length"].as_u64().unwrap();
        let offset = body["offset"].as_u64().unwrap();
        let entities: Vec<Value> = (offset..self.total.min(offset + length)).map(payload::vm).collect();

        ResponseTemplate::new(200).set_body_json(json!({
            "api_version": "3.1",
            "metadata": {"kind": "vm", "total_matches": self.total, "length": entities.len(), "offset": offset},
            "entities": entities
        }))
    }
}

#[tokio::test]
async fn should_page_through_vms_and_apply_custom_filter() {
    // Arrange
    let app = TestApp::new().await;
    Mock::given(method("POST"))
        .and(path("/api/nutanix/v3/vms/list"))
        .and(body_partial_json(json!({"kind": "vm", "length": 20, "filter": "name==vm.*"})))
        .respond_with(VmPages { total: 55 })
        .expect(3)
        .mount(&app.server)
        .await;

    // Act
    let out = app
        .run(
            "vm_info",
            json!({
                "filter": "name==vm.*",
                "length": 50,
                "custom_filter": {"spec.resources.num_sockets": 2}
            }),
        )
        .await;

    // Assert
    assert!(!out.failed, "{:?}", out);
    let entities = out.response["entities"].as_array().unwrap();
    assert!(entities.len() <= 50);
    assert!(!entities.is_empty());
    assert!(entities.iter().all(|vm| vm["spec"]["resources"]["num_sockets"] == 2));
    assert_eq!(out.response["metadata"]["offset"], 0);
    assert_eq!(out.response["metadata"]["length"], entities.len());
}

#[tokio::test]
async fn should_update_vm_memory_through_intent_envelope() {
    // Arrange
    let app = TestApp::new().await;
    Mock::given(method("GET"))
        .and(path("/api/nutanix/v3/vms/vm-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(payload::vm(1)))
        .mount(&app.server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/nutanix/v3/vms/vm-1"))
        .and(body_partial_json(json!({
            "api_version": "3.1.0",
            "metadata": {"uuid": "vm-1", "spec_version": 1},
            "spec": {"resources": {"memory_size_mib": 4096}}
        })))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "status": {"state": "PENDING", "execution_context": {"task_uuid": "t-5"}}
        })))
        .expect(1)
        .mount(&app.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/nutanix/v3/tasks/t-5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"uuid": "t-5", "status": "SUCCEEDED"})))
        .mount(&app.server)
        .await;

    // Act
    let out = app.run("vm", json!({"vm_uuid": "vm-1", "memory_gb": 4})).await;

    // Assert
    assert!(out.changed, "{:?}", out);
    assert_eq!(out.task_ext_id.as_deref(), Some("t-5"));
    assert_eq!(out.ext_id.as_deref(), Some("vm-1"));
}

#[tokio::test]
async fn should_fail_with_task_errors() {
    // Arrange
    let app = TestApp::new().await;
    Mock::given(method("DELETE"))
        .and(path("/api/nutanix/v3/vms/vm-1"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "status": {"state": "DELETE_PENDING", "execution_context": {"task_uuid": "t-6"}}
        })))
        .mount(&app.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/nutanix/v3/tasks/t-6"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "uuid": "t-6",
            "status": "FAILED",
            "error_detail": "VM is protected"
        })))
        .mount(&app.server)
        .await;

    // Act
    let out = app.run("vm", json!({"state": "absent", "vm_uuid": "vm-1"})).await;

    // Assert
    assert!(out.failed);
    assert_eq!(out.error.as_deref(), Some("TaskFailed"));
    assert!(out.msg.unwrap().contains("VM is protected"));
    assert_eq!(out.task_ext_id.as_deref(), Some("t-6"));
}

#[tokio::test]
async fn should_report_upstream_error_body() {
    // Arrange
    let app = TestApp::new().await;
    Mock::given(method("POST"))
        .and(path("/api/nutanix/v3/vms"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({"message_list": [{"message": "bad spec"}]})))
        .expect(1)
        .mount(&app.server)
        .await;

    // Act
    let out = app.run("vm", json!({"name": "vm1", "cluster": "c-1"})).await;

    // Assert
    assert!(out.failed);
    assert_eq!(out.error.as_deref(), Some("UpstreamError"));
    assert!(out.msg.unwrap().contains("bad spec"));
}
