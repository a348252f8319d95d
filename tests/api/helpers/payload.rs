use serde_json::{Value, json};

pub fn task_reference(task_id: &str) -> Value {
    json!({
        "data": {
            "extId": task_id,
            "$objectType": "prism.v4.config.TaskReference"
        }
    })
}

pub fn task(task_id: &str, status: &str) -> Value {
    json!({
        "data": {
            "extId": task_id,
            "status": status,
            "progressPercentage": if status == "SUCCEEDED" { 100 } else { 40 },
            "entitiesAffected": [],
            "completionDetails": []
        }
    })
}

pub fn vpc(ext_id: &str, name: &str) -> Value {
    json!({
        "data": {
            "extId": ext_id,
            "name": name,
            "vpcType": "REGULAR",
            "externalSubnets": [{
                "subnetReference": "s-1",
                "externalIps": [{"ipv4": {"value": "10.44.3.199", "prefixLength": 32}}],
                "activeGatewayNodes": [{"nodeId": "n-1", "nodeIpAddress": {"ipv4": {"value": "10.44.3.10"}}}]
            }],
            "snatIps": [{"ipv4": {"value": "10.44.3.199", "prefixLength": 32}}],
            "$reserved": {"ETag": "E-body"},
            "$objectType": "networking.v4.config.Vpc"
        }
    })
}

pub fn vm(index: u64) -> Value {
    json!({
        "metadata": {"kind": "vm", "uuid": format!("vm-{}", index), "spec_version": 1},
        "spec": {
            "name": format!("vm{}", index),
            "resources": {"num_sockets": index % 2 + 1, "num_vcpus_per_socket": 1, "memory_size_mib": 1024}
        },
        "status": {"state": "COMPLETE"}
    })
}
