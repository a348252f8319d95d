use crate::client::endpoint::Surface;
use crate::ops::typed::{CreatedId, TypedResource};
use crate::spec::schema::{BuilderTable, Entry, Kind};

const FLASH_MODE: &[Entry] = &[Entry::field("is_enabled", Kind::Scalar)];

const STORAGE_FEATURES: &[Entry] = &[Entry::field("flash_mode", Kind::Object(FLASH_MODE))];

const ISCSI_FEATURES: &[Entry] = &[
    Entry::field("target_secret", Kind::Scalar),
    Entry::field("enabled_authentications", Kind::Scalar),
];

pub const TABLE: BuilderTable = BuilderTable {
    entries: &[
        Entry::field("name", Kind::Scalar),
        Entry::field("description", Kind::Scalar),
        Entry::field("should_load_balance_vm_attachments", Kind::Scalar),
        Entry::field("sharing_status", Kind::Scalar),
        Entry::field("target_prefix", Kind::Scalar),
        Entry::field("target_name", Kind::Scalar),
        Entry::field("enabled_authentications", Kind::Scalar),
        Entry::field("cluster_reference", Kind::Scalar),
        Entry::field("usage_type", Kind::Scalar),
        Entry::field("is_hidden", Kind::Scalar),
        Entry::field("created_by", Kind::Scalar),
        Entry::field("storage_features", Kind::Object(STORAGE_FEATURES)),
        Entry::field("iscsi_features", Kind::Object(ISCSI_FEATURES)),
    ],
    read_only: &["tenant_id"],
    // The server never echoes the CHAP secret back.
    ignored: &["iscsi_features.target_secret"],
};

/// Volume groups, `/api/volumes/v4.0/config/volume-groups`.
pub const VOLUME_GROUP: TypedResource = TypedResource {
    name: "volume_group",
    surface: Surface::VOLUMES,
    resource: "/config/volume-groups",
    table: &TABLE,
    created: CreatedId::CompletionKey("volumeGroupExtIds"),
};
