use crate::capability::CloudTypes;
use crate::schema::{FieldRole, FieldSpec, ResourceSchema};
use crate::validate::Rule;
use crate::value::{FieldType, RecordSpec};

const GCP_SUBNET: RecordSpec = RecordSpec {
    required: &["name", "region", "cidr"],
    optional: &[],
};

/// Every VPC attribute is fixed at creation.
pub(super) fn schema() -> ResourceSchema {
    use FieldRole::{Computed, CreateOnly};
    use FieldType::{Bool, Int, Str};

    let regional = CloudTypes::AWS_RELATED
        | CloudTypes::AZURE_RELATED
        | CloudTypes::OCI_RELATED
        | CloudTypes::ALI_RELATED;

    ResourceSchema::new("vpc", "name", CloudTypes::CLOUD)
        .fields([
            FieldSpec::new("cloud_type", Int, CreateOnly).required(),
            FieldSpec::new("account_name", Str, CreateOnly).required(),
            FieldSpec::new("region", Str, CreateOnly),
            FieldSpec::new("cidr", Str, CreateOnly),
            FieldSpec::new("subnets", FieldType::Records(GCP_SUBNET), CreateOnly),
            FieldSpec::new("aviatrix_transit_vpc", Bool, CreateOnly),
            FieldSpec::new("aviatrix_firenet_vpc", Bool, CreateOnly),
            FieldSpec::new("enable_private_oob_subnet", Bool, CreateOnly),
            FieldSpec::new("subnet_size", Int, CreateOnly),
            FieldSpec::new("num_of_subnet_pairs", Int, CreateOnly),
            FieldSpec::new("resource_group", Str, CreateOnly),
            FieldSpec::new("vpc_id", Str, Computed),
        ])
        .rules([
            Rule::required_on("region", regional),
            Rule::required_on("cidr", regional),
            Rule::cloud_scoped("cidr", regional),
            Rule::cloud_scoped("subnets", CloudTypes::GCP_RELATED),
            Rule::required_on("subnets", CloudTypes::GCP_RELATED),
            Rule::cloud_scoped("enable_private_oob_subnet", CloudTypes::AWS_RELATED),
            Rule::cloud_scoped("resource_group", CloudTypes::AZURE_RELATED),
            Rule::exclusive("aviatrix_transit_vpc", "aviatrix_firenet_vpc"),
            Rule::requires("subnet_size", &["num_of_subnet_pairs"]),
            Rule::requires("num_of_subnet_pairs", &["subnet_size"]),
            Rule::range("subnet_size", 16, 28),
            Rule::range("num_of_subnet_pairs", 1, 8),
            Rule::cidr("cidr"),
        ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::DesiredConfig;
    use crate::validate::{ViolationKind, violations};
    use crate::value::FieldValue;

    fn first(cfg: &DesiredConfig) -> Option<ViolationKind> {
        violations(&schema(), cfg, cfg.cloud_type())
            .first()
            .map(|v| v.kind)
    }

    #[test]
    fn test_aws_vpc_needs_region_and_cidr() {
        let cfg = DesiredConfig::new("vpc", "net")
            .with("cloud_type", FieldValue::Int(1))
            .with("account_name", FieldValue::str("acct"));
        assert_eq!(first(&cfg), Some(ViolationKind::Required));

        let cfg = cfg
            .with("region", FieldValue::str("us-east-1"))
            .with("cidr", FieldValue::str("10.0.0.0/16"));
        assert_eq!(first(&cfg), None);

        let bad = cfg.with("cidr", FieldValue::str("10.0.0.0/33"));
        assert_eq!(first(&bad), Some(ViolationKind::Format));
    }

    #[test]
    fn test_gcp_vpc_uses_subnets() {
        let subnet = [("name", "s1"), ("region", "us-west1"), ("cidr", "10.0.0.0/24")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let cfg = DesiredConfig::new("vpc", "net")
            .with("cloud_type", FieldValue::Int(4))
            .with("account_name", FieldValue::str("acct"))
            .with("subnets", FieldValue::Records(vec![subnet]));
        assert_eq!(first(&cfg), None);

        let cfg = cfg.with("cidr", FieldValue::str("10.0.0.0/16"));
        assert_eq!(first(&cfg), Some(ViolationKind::CloudScope));
    }

    #[test]
    fn test_transit_and_firenet_exclusive() {
        let cfg = DesiredConfig::new("vpc", "net")
            .with("cloud_type", FieldValue::Int(1))
            .with("account_name", FieldValue::str("acct"))
            .with("region", FieldValue::str("us-east-1"))
            .with("cidr", FieldValue::str("10.0.0.0/16"))
            .with("aviatrix_transit_vpc", FieldValue::Bool(true))
            .with("aviatrix_firenet_vpc", FieldValue::Bool(true));
        assert_eq!(first(&cfg), Some(ViolationKind::MutuallyExclusive));
    }
}
