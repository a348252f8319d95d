use crate::client::endpoint::Surface;
use crate::ops::typed::{CreatedId, TypedResource};
use crate::spec::schema::{BuilderTable, Entry, Kind};

const EXTERNAL_SUBNET: &[Entry] = &[
    Entry::field("subnet_reference", Kind::Scalar),
    Entry::field("external_ips", Kind::List(&Kind::IpAddress)),
    Entry::field("gateway_nodes", Kind::List(&Kind::Scalar)),
    Entry::field("active_gateway_node", Kind::Map),
];

const DHCP_OPTIONS: &[Entry] = &[Entry::field(
    "domain_name_servers",
    Kind::List(&Kind::IpAddress),
)];

const ROUTABLE_PREFIX: &[Entry] = &[
    Entry::field("ipv4", Kind::Map),
    Entry::field("ipv6", Kind::Map),
];

pub const TABLE: BuilderTable = BuilderTable {
    entries: &[
        Entry::field("name", Kind::Scalar),
        Entry::field("description", Kind::Scalar),
        Entry::field("vpc_type", Kind::Scalar),
        Entry::field("external_subnets", Kind::List(&Kind::Object(EXTERNAL_SUBNET))),
        Entry::field("external_routing_domain_reference", Kind::Scalar),
        Entry::field("externally_routable_prefixes", Kind::List(&Kind::Object(ROUTABLE_PREFIX))),
        Entry::field("common_dhcp_options", Kind::Object(DHCP_OPTIONS)),
    ],
    read_only: &[
        "snat_ips",
        "tenant_id",
        "external_subnets.active_gateway_nodes",
        "external_subnets.active_gateway_count",
    ],
    ignored: &[],
};

/// Virtual private clouds, `/api/networking/v4.0/config/vpcs`.
pub const VPC: TypedResource = TypedResource {
    name: "vpc",
    surface: Surface::NETWORKING,
    resource: "/config/vpcs",
    table: &TABLE,
    created: CreatedId::Rel("networking:config:vpc"),
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{generate_spec, is_unchanged, to_camel_case_keys};
    use serde_json::json;

    #[test]
    fn builds_wire_body_with_default_prefixes() {
        let params = json!({
            "name": "v1",
            "external_subnets": [{"subnet_reference": "s-1", "external_ips": ["10.44.3.199"]}],
            "common_dhcp_options": {"domain_name_servers": ["8.8.8.8"]}
        });

        let spec = generate_spec(json!({}), params.as_object().unwrap(), &TABLE).unwrap();

        assert_eq!(
            to_camel_case_keys(spec),
            json!({
                "name": "v1",
                "externalSubnets": [{
                    "subnetReference": "s-1",
                    "externalIps": [{"ipv4": {"value": "10.44.3.199", "prefixLength": 32}}]
                }],
                "commonDhcpOptions": {"domainNameServers": [{"ipv4": {"value": "8.8.8.8", "prefixLength": 32}}]}
            })
        );
    }

    #[test]
    fn server_assigned_gateway_state_is_not_a_change() {
        let current = json!({
            "ext_id": "vpc-1",
            "name": "v1",
            "snat_ips": [{"ipv4": {"value": "10.44.3.200"}}],
            "external_subnets": [{"subnet_reference": "s-1", "active_gateway_nodes": [{"node_id": "n-1"}]}],
            "$reserved": {"ETag": "E1"}
        });
        let params = json!({"external_subnets": [{"subnet_reference": "s-1"}]});

        let desired = generate_spec(current.clone(), params.as_object().unwrap(), &TABLE).unwrap();

        assert!(is_unchanged(&desired, &current, &TABLE));
    }
}
