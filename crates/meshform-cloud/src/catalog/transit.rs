use super::gateway::{base_fields, common_rules, feature_fields, ha_spec, subnet_tokens};
use crate::capability::CloudTypes;
use crate::schema::{FieldRole, FieldSpec, ResourceSchema};
use crate::validate::Rule;
use crate::value::{Equality, FieldType, RecordSpec};

const BGP_LAN_INTERFACE: RecordSpec = RecordSpec {
    required: &["vpc_id", "subnet"],
    optional: &["ha_subnet"],
};

pub(super) fn schema() -> ResourceSchema {
    use FieldType::{Bool, StrSet};

    let mut schema = ResourceSchema::new("transit_gateway", "gw_name", CloudTypes::CLOUD)
        .fields(base_fields())
        .fields(feature_fields())
        .fields([
            FieldSpec::new("enable_designated_gateway", Bool, FieldRole::CreateOnly),
            FieldSpec::new("enable_transit_firenet", Bool, FieldRole::Toggle {
                enable: "enable_transit_firenet",
                disable: "disable_transit_firenet",
            }),
            FieldSpec::new("enable_segmentation", Bool, FieldRole::Toggle {
                enable: "enable_segmentation",
                disable: "disable_segmentation",
            }),
            FieldSpec::new("enable_advertise_transit_cidr", Bool, FieldRole::Toggle {
                enable: "enable_advertise_transit_cidr",
                disable: "disable_advertise_transit_cidr",
            }),
            FieldSpec::new("bgp_ecmp", Bool, FieldRole::Toggle {
                enable: "enable_bgp_ecmp",
                disable: "disable_bgp_ecmp",
            }),
            FieldSpec::new("bgp_manual_spoke_advertise_cidrs", StrSet, FieldRole::Setting {
                operation: "edit_bgp_manual_spoke_advertise_cidrs",
            })
            .with_equality(Equality::UnorderedCaseInsensitive),
            FieldSpec::new("excluded_advertised_spoke_routes", StrSet, FieldRole::Setting {
                operation: "edit_excluded_advertised_spoke_routes",
            })
            .with_equality(Equality::UnorderedCaseInsensitive),
            FieldSpec::new(
                "bgp_lan_interfaces",
                FieldType::Records(BGP_LAN_INTERFACE),
                FieldRole::CreateOnly,
            ),
        ])
        .rules(common_rules())
        .rules([
            Rule::cloud_scoped("enable_designated_gateway", CloudTypes::AWS_RELATED),
            // designated gateways are single node
            Rule::forbids("enable_designated_gateway", "ha_subnet"),
            Rule::cloud_scoped("bgp_lan_interfaces", CloudTypes::GCP_RELATED),
            Rule::requires("bgp_lan_interfaces", &["enable_bgp"]),
            Rule::requires("bgp_manual_spoke_advertise_cidrs", &["enable_bgp"]),
            Rule::cidr("bgp_manual_spoke_advertise_cidrs"),
            Rule::cidr("excluded_advertised_spoke_routes"),
            Rule::exclusive("enable_transit_firenet", "enable_segmentation"),
        ])
        .ha(ha_spec(
            "transit_ha_gateway",
            "create_transit_ha_gateway",
            "delete_transit_ha_gateway",
        ));
    schema.tokens.extend(subnet_tokens());
    schema
}
