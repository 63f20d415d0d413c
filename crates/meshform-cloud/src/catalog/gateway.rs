//! Spoke gateway, plus the field groups transit gateways share with it

use crate::capability::CloudTypes;
use crate::schema::{FieldRole, FieldSpec, HaSpec, ResourceSchema, TokenBinding};
use crate::token::TokenFamily;
use crate::validate::Rule;
use crate::value::{Equality, FieldType, FieldValue};

const fn toggle(enable: &'static str, disable: &'static str) -> FieldRole {
    FieldRole::Toggle { enable, disable }
}

const fn setting(operation: &'static str) -> FieldRole {
    FieldRole::Setting { operation }
}

/// Placement, sizing and addressing shared by every gateway kind.
pub(super) fn base_fields() -> Vec<FieldSpec> {
    use FieldRole::{Computed, CreateOnly};
    use FieldType::{Bool, Int, Str};

    vec![
        FieldSpec::new("cloud_type", Int, CreateOnly).required(),
        FieldSpec::new("account_name", Str, CreateOnly).required(),
        FieldSpec::new("vpc_id", Str, CreateOnly).required(),
        FieldSpec::new("vpc_reg", Str, CreateOnly).required(),
        FieldSpec::new("gw_size", Str, FieldRole::Resize {
            operation: "edit_gw_size",
        })
        .required(),
        FieldSpec::new("subnet", Str, CreateOnly).required(),
        FieldSpec::new("zone", Str, CreateOnly),
        FieldSpec::new("insane_mode", Bool, CreateOnly),
        FieldSpec::new("insane_mode_az", Str, CreateOnly),
        FieldSpec::new("availability_domain", Str, CreateOnly),
        FieldSpec::new("fault_domain", Str, CreateOnly),
        FieldSpec::new("allocate_new_eip", Bool, CreateOnly).with_default(FieldValue::Bool(true)),
        FieldSpec::new("eip", Str, CreateOnly),
        FieldSpec::new("enable_bgp", Bool, CreateOnly),
        FieldSpec::new("ha_subnet", Str, FieldRole::Ha),
        FieldSpec::new("ha_zone", Str, FieldRole::Ha),
        FieldSpec::new("ha_insane_mode_az", Str, FieldRole::Ha),
        FieldSpec::new("ha_availability_domain", Str, FieldRole::Ha),
        FieldSpec::new("ha_fault_domain", Str, FieldRole::Ha),
        FieldSpec::new("ha_eip", Str, FieldRole::Ha),
        FieldSpec::new("ha_gw_size", Str, FieldRole::Ha),
        FieldSpec::new("public_ip", Str, Computed),
        FieldSpec::new("private_ip", Str, Computed),
        FieldSpec::new("cloud_instance_id", Str, Computed),
        FieldSpec::new("ha_public_ip", Str, Computed),
    ]
}

/// Switches and BGP settings shared by spoke and transit gateways.
pub(super) fn feature_fields() -> Vec<FieldSpec> {
    use FieldType::{Bool, Int, Str, StrList};

    vec![
        FieldSpec::new("single_ip_snat", Bool, toggle("enable_snat", "disable_snat")),
        FieldSpec::new(
            "enable_vpc_dns_server",
            Bool,
            toggle("enable_vpc_dns_server", "disable_vpc_dns_server"),
        ),
        FieldSpec::new(
            "enable_jumbo_frame",
            Bool,
            toggle("enable_jumbo_frame", "disable_jumbo_frame"),
        ),
        FieldSpec::new(
            "enable_active_standby",
            Bool,
            toggle("enable_active_standby", "disable_active_standby"),
        ),
        FieldSpec::new(
            "enable_active_standby_preemptive",
            Bool,
            toggle(
                "enable_active_standby_preemptive",
                "disable_active_standby_preemptive",
            ),
        ),
        FieldSpec::new("local_as_number", Str, setting("edit_local_as_number")),
        FieldSpec::new("prepend_as_path", StrList, setting("edit_prepend_as_path")),
        FieldSpec::new("bgp_hold_time", Int, setting("change_bgp_hold_time"))
            .with_default(FieldValue::Int(180)),
        FieldSpec::new("bgp_polling_time", Int, setting("change_bgp_polling_time"))
            .with_default(FieldValue::Int(50)),
        FieldSpec::new(
            "enable_learned_cidrs_approval",
            Bool,
            toggle(
                "enable_learned_cidrs_approval",
                "disable_learned_cidrs_approval",
            ),
        ),
        FieldSpec::new(
            "learned_cidrs_approval_mode",
            Str,
            setting("set_learned_cidrs_approval_mode"),
        )
        .with_default(FieldValue::str("gateway")),
        FieldSpec::new(
            "tags",
            FieldType::Map,
            FieldRole::Tags {
                operation: "update_tags",
            },
        ),
    ]
}

/// Subnet tokens: Azure zone, AWS insane mode AZ and OCI domains, for both
/// the primary subnet and the HA subnet.
pub(super) fn subnet_tokens() -> Vec<TokenBinding> {
    vec![
        TokenBinding::new(
            "subnet",
            vec!["zone"],
            CloudTypes::AZURE_RELATED,
            TokenFamily::AzureZone,
        ),
        TokenBinding::new(
            "subnet",
            vec!["insane_mode_az"],
            CloudTypes::AWS_RELATED,
            TokenFamily::InsaneModeAz,
        )
        .when("insane_mode"),
        TokenBinding::new(
            "subnet",
            vec!["availability_domain", "fault_domain"],
            CloudTypes::OCI_RELATED,
            TokenFamily::OciDomain,
        ),
        TokenBinding::new(
            "ha_subnet",
            vec!["ha_zone"],
            CloudTypes::AZURE_RELATED,
            TokenFamily::AzureZone,
        ),
        TokenBinding::new(
            "ha_subnet",
            vec!["ha_insane_mode_az"],
            CloudTypes::AWS_RELATED,
            TokenFamily::InsaneModeAz,
        )
        .when("insane_mode"),
        TokenBinding::new(
            "ha_subnet",
            vec!["ha_availability_domain", "ha_fault_domain"],
            CloudTypes::OCI_RELATED,
            TokenFamily::OciDomain,
        ),
    ]
}

/// Secondary gateway of kind `kind`.
pub(super) fn ha_spec(kind: &'static str, create: &'static str, delete: &'static str) -> HaSpec {
    HaSpec {
        kind,
        suffix: "-hagw",
        // GCP places the secondary by zone alone
        triggers: vec!["ha_subnet", "ha_zone"],
        mandatory: vec![
            (CloudTypes::CLOUD, "ha_gw_size"),
            (
                CloudTypes::AWS_RELATED | CloudTypes::AZURE_RELATED | CloudTypes::OCI_RELATED,
                "ha_subnet",
            ),
            (CloudTypes::OCI_RELATED, "ha_availability_domain"),
            (CloudTypes::OCI_RELATED, "ha_fault_domain"),
        ],
        placement: vec![
            "ha_subnet",
            "ha_zone",
            "ha_insane_mode_az",
            "ha_availability_domain",
            "ha_fault_domain",
            "ha_eip",
        ],
        size_field: "ha_gw_size",
        observed_marker: "ha_gw_name",
        create,
        delete,
        resize: "edit_ha_gw_size",
    }
}

/// Placement and BGP rules shared by spoke and transit gateways.
pub(super) fn common_rules() -> Vec<Rule> {
    let oci = CloudTypes::OCI_RELATED;
    let aws = CloudTypes::AWS_RELATED;

    vec![
        Rule::cloud_scoped("zone", CloudTypes::AZURE_RELATED),
        Rule::cloud_scoped("availability_domain", oci),
        Rule::cloud_scoped("fault_domain", oci),
        Rule::required_on("availability_domain", oci),
        Rule::required_on("fault_domain", oci),
        Rule::cloud_scoped("insane_mode_az", aws),
        Rule::requires("insane_mode_az", &["insane_mode"]),
        Rule::required_on_when("insane_mode_az", aws, "insane_mode"),
        Rule::cloud_scoped("ha_zone", CloudTypes::AZURE_RELATED | CloudTypes::GCP_RELATED),
        Rule::cloud_scoped("ha_insane_mode_az", aws),
        Rule::cloud_scoped("ha_availability_domain", oci),
        Rule::cloud_scoped("ha_fault_domain", oci),
        Rule::requires("ha_gw_size", &["ha_subnet", "ha_zone"]),
        Rule::requires("ha_eip", &["ha_subnet", "ha_zone"]),
        Rule::requires("ha_insane_mode_az", &["ha_subnet", "ha_zone"]),
        Rule::requires("ha_availability_domain", &["ha_subnet", "ha_zone"]),
        Rule::requires("ha_fault_domain", &["ha_subnet", "ha_zone"]),
        // setting false is accepted on every cloud
        Rule::cloud_scoped("enable_jumbo_frame", aws | CloudTypes::GCP_RELATED),
        Rule::requires_false("eip", "allocate_new_eip"),
        Rule::requires("ha_eip", &["eip"]),
        Rule::cidr("subnet"),
        Rule::cidr("ha_subnet"),
        Rule::coupled("enable_active_standby_preemptive", "enable_active_standby"),
        Rule::requires("enable_active_standby", &["ha_subnet", "ha_zone"]),
        Rule::requires("prepend_as_path", &["local_as_number"]),
        Rule::range("bgp_hold_time", 12, 360),
        Rule::range("bgp_polling_time", 10, 50),
        Rule::one_of("learned_cidrs_approval_mode", &["gateway", "connection"]),
        Rule::HaComplete,
    ]
}

pub(super) fn schema() -> ResourceSchema {
    let mut schema = ResourceSchema::new("gateway", "gw_name", CloudTypes::CLOUD)
        .remote_kind("spoke_gateway")
        .fields(base_fields())
        .fields(feature_fields())
        .fields([
            FieldSpec::new(
                "spoke_bgp_manual_advertise_cidrs",
                FieldType::StrSet,
                setting("edit_spoke_bgp_manual_advertise_cidrs"),
            )
            .with_equality(Equality::UnorderedCaseInsensitive),
            FieldSpec::new(
                "customized_spoke_vpc_routes",
                FieldType::StrSet,
                FieldRole::Replace {
                    clear: "clear_customized_spoke_vpc_routes",
                    set: "edit_customized_spoke_vpc_routes",
                },
            )
            .with_equality(Equality::UnorderedCaseInsensitive),
            FieldSpec::new(
                "included_advertised_spoke_routes",
                FieldType::StrSet,
                setting("edit_advertised_spoke_routes"),
            )
            .with_equality(Equality::UnorderedCaseInsensitive),
        ])
        .rules(common_rules())
        .rules([
            Rule::requires("spoke_bgp_manual_advertise_cidrs", &["enable_bgp"]),
            Rule::cidr("spoke_bgp_manual_advertise_cidrs"),
            Rule::cidr("customized_spoke_vpc_routes"),
            Rule::cidr("included_advertised_spoke_routes"),
        ])
        .ha(ha_spec(
            "spoke_ha_gateway",
            "create_spoke_ha_gateway",
            "delete_spoke_ha_gateway",
        ));
    schema.tokens.extend(subnet_tokens());
    schema
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::CloudType;
    use crate::record::DesiredConfig;
    use crate::validate::{ViolationKind, validate, violations};

    fn spoke(cloud: i64) -> DesiredConfig {
        DesiredConfig::new("gateway", "spoke")
            .with("cloud_type", FieldValue::Int(cloud))
            .with("account_name", FieldValue::str("acct"))
            .with("vpc_id", FieldValue::str("vpc-1"))
            .with("vpc_reg", FieldValue::str("region-1"))
            .with("gw_size", FieldValue::str("small"))
            .with("subnet", FieldValue::str("10.0.0.0/24"))
    }

    fn kind(cfg: &DesiredConfig) -> Option<ViolationKind> {
        let cloud = cfg.cloud_type();
        violations(&schema(), cfg, cloud).first().map(|v| v.kind)
    }

    #[test]
    fn test_minimal_spoke_is_valid() {
        for cloud in [1, 8, 256] {
            let cfg = spoke(cloud);
            assert!(validate(&schema(), &cfg, cfg.cloud_type()).is_ok(), "cloud {cloud}");
        }
    }

    #[test]
    fn test_oci_needs_domains() {
        let cfg = spoke(16);
        assert_eq!(kind(&cfg), Some(ViolationKind::Required));
        let cfg = cfg
            .with("availability_domain", FieldValue::str("ad-1"))
            .with("fault_domain", FieldValue::str("fd-1"));
        assert_eq!(kind(&cfg), None);
    }

    #[test]
    fn test_insane_mode_az_needs_insane_mode() {
        let cfg = spoke(1).with("insane_mode_az", FieldValue::str("us-east-1a"));
        assert_eq!(kind(&cfg), Some(ViolationKind::ConditionalRequirement));

        let cfg = spoke(1).with("insane_mode", FieldValue::Bool(true));
        assert_eq!(kind(&cfg), Some(ViolationKind::Required));
    }

    #[test]
    fn test_jumbo_frame_scope_is_asymmetric() {
        let on = spoke(8).with("enable_jumbo_frame", FieldValue::Bool(true));
        assert_eq!(kind(&on), Some(ViolationKind::CloudScope));
        let off = spoke(8).with("enable_jumbo_frame", FieldValue::Bool(false));
        assert_eq!(kind(&off), None);
    }

    #[test]
    fn test_gcp_ha_by_zone() {
        let cfg = spoke(4)
            .with("ha_zone", FieldValue::str("us-west1-b"))
            .with("ha_gw_size", FieldValue::str("n1-standard-1"));
        assert_eq!(kind(&cfg), None);

        let cfg = spoke(1)
            .with("ha_zone", FieldValue::str("us-west1-b"))
            .with("ha_gw_size", FieldValue::str("t3.small"));
        assert_eq!(kind(&cfg), Some(ViolationKind::CloudScope));
    }

    #[test]
    fn test_ha_fields_need_ha_trigger() {
        let oci = spoke(16)
            .with("availability_domain", FieldValue::str("ad-1"))
            .with("fault_domain", FieldValue::str("fd-1"));
        let cases = [
            (spoke(1), "ha_gw_size", "t3.small"),
            (spoke(1), "ha_eip", "52.0.0.2"),
            (spoke(1), "ha_insane_mode_az", "us-east-1b"),
            (oci.clone(), "ha_availability_domain", "ad-2"),
            (oci, "ha_fault_domain", "fd-2"),
        ];
        for (base, field, value) in cases {
            let cfg = base.with(field, FieldValue::str(value));
            let cloud = cfg.cloud_type();
            let found = violations(&schema(), &cfg, cloud);
            assert!(
                found.iter().any(|v| v.kind == ViolationKind::ConditionalRequirement
                    && v.fields.first().map(String::as_str) == Some(field)
                    && v.fields.iter().any(|f| f == "ha_subnet")),
                "{field}: {found:?}"
            );

            let cfg = cfg.with("ha_subnet", FieldValue::str("10.0.1.0/24"));
            let found = violations(&schema(), &cfg, cloud);
            assert!(
                !found.iter().any(|v| v.fields.first().map(String::as_str) == Some(field)
                    && v.fields.iter().any(|f| f == "ha_subnet")),
                "{field} with ha_subnet: {found:?}"
            );
        }
    }

    #[test]
    fn test_cloud_type_is_total() {
        let cfg = spoke(1);
        assert_eq!(
            violations(&schema(), &cfg, CloudType::EDGE_NEO)[0].kind,
            ViolationKind::UnsupportedCloud
        );
    }
}
