use crate::ops::intent::{IntentResource, reference};
use crate::list::DEFAULT_PAGE_LIMIT;
use crate::prelude::{Error, Result};
use crate::spec::schema::{BuilderTable, Entry, Kind};
use crate::spec::set_path;
use serde_json::{Value, json};

fn memory_gb(spec: &mut Value, value: &Value) -> Result<()> {
    let gb = value
        .as_u64()
        .ok_or_else(|| Error::Config("'memory_gb' must be a whole number of GiB".to_owned()))?;
    let mib = gb
        .checked_mul(1024)
        .ok_or_else(|| Error::Config(format!("'memory_gb' {} is out of range", gb)))?;
    set_path(spec, "resources.memory_size_mib", json!(mib));
    Ok(())
}

fn cluster(spec: &mut Value, value: &Value) -> Result<()> {
    set_path(spec, "cluster_reference", reference("cluster", value)?);
    Ok(())
}

pub const TABLE: BuilderTable = BuilderTable {
    entries: &[
        Entry::field("name", Kind::Scalar),
        Entry::at("desc", "description", Kind::Scalar),
        Entry::custom("cluster", cluster),
        Entry::at("vcpus", "resources.num_sockets", Kind::Scalar),
        Entry::at("cores_per_vcpu", "resources.num_vcpus_per_socket", Kind::Scalar),
        Entry::custom("memory_gb", memory_gb),
        Entry::at("power_state", "resources.power_state", Kind::Scalar),
        Entry::at("boot_type", "resources.boot_config.boot_type", Kind::Scalar),
        Entry::at("guest_customization", "resources.guest_customization", Kind::Map),
    ],
    read_only: &[
        "resources.power_state_mechanism",
        "resources.hardware_clock_timezone",
        "resources.vnuma_config",
        "resources.host_reference",
        "resources.hypervisor_type",
    ],
    ignored: &[],
};

/// Virtual machines, `/api/nutanix/v3/vms`.
pub const VM: IntentResource = IntentResource {
    name: "vm",
    kind: "vm",
    resource: "/vms",
    id_param: "vm_uuid",
    table: &TABLE,
    page_limit: DEFAULT_PAGE_LIMIT,
};
