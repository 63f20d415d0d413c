use crate::capability::CloudTypes;
use crate::schema::{FieldRole, FieldSpec, ResourceSchema, TokenBinding};
use crate::token::TokenFamily;
use crate::validate::Rule;
use crate::value::FieldType;

pub(super) fn schema() -> ResourceSchema {
    use FieldRole::{Computed, CreateOnly};
    use FieldType::{Int, Str};

    let aws = CloudTypes::AWS_RELATED;
    let azure = CloudTypes::AZURE_RELATED;
    let oci = CloudTypes::OCI_RELATED;
    let clouds = aws | azure | CloudTypes::GCP_RELATED | oci;

    ResourceSchema::new("firewall_instance", "firewall_name", clouds)
        .fields([
            FieldSpec::new("cloud_type", Int, CreateOnly).required(),
            FieldSpec::new("vpc_id", Str, CreateOnly).required(),
            FieldSpec::new("firenet_gw_name", Str, CreateOnly).required(),
            FieldSpec::new("firewall_image", Str, CreateOnly).required(),
            FieldSpec::new("firewall_image_version", Str, CreateOnly),
            FieldSpec::new("firewall_size", Str, CreateOnly).required(),
            FieldSpec::new("egress_subnet", Str, CreateOnly).required(),
            FieldSpec::new("management_subnet", Str, CreateOnly),
            FieldSpec::new("zone", Str, CreateOnly),
            FieldSpec::new("availability_domain", Str, CreateOnly),
            FieldSpec::new("fault_domain", Str, CreateOnly),
            FieldSpec::new("key_name", Str, CreateOnly),
            FieldSpec::new("iam_role", Str, CreateOnly),
            FieldSpec::new("bootstrap_bucket_name", Str, CreateOnly),
            FieldSpec::new("username", Str, CreateOnly),
            FieldSpec::new("password", Str, CreateOnly),
            FieldSpec::new("ssh_public_key", Str, CreateOnly),
            FieldSpec::new("tags", FieldType::Map, FieldRole::Tags {
                operation: "update_firewall_tags",
            }),
            FieldSpec::new("instance_id", Str, Computed),
            FieldSpec::new("public_ip", Str, Computed),
        ])
        .rules([
            Rule::cloud_scoped("zone", azure | CloudTypes::GCP_RELATED),
            Rule::cloud_scoped("availability_domain", oci),
            Rule::cloud_scoped("fault_domain", oci),
            Rule::required_on("availability_domain", oci),
            Rule::required_on("fault_domain", oci),
            Rule::cloud_scoped("key_name", aws),
            Rule::cloud_scoped("iam_role", aws),
            Rule::cloud_scoped("bootstrap_bucket_name", aws),
            Rule::cloud_scoped("username", azure),
            Rule::cloud_scoped("ssh_public_key", azure),
            Rule::required_on("username", azure),
            Rule::exclusive("password", "ssh_public_key"),
            Rule::cloud_scoped("tags", aws | azure),
            Rule::cidr("egress_subnet"),
            Rule::cidr("management_subnet"),
        ])
        .token(TokenBinding::new(
            "egress_subnet",
            vec!["zone"],
            azure,
            TokenFamily::AzureZone,
        ))
        .token(TokenBinding::new(
            "egress_subnet",
            vec!["availability_domain", "fault_domain"],
            oci,
            TokenFamily::OciDomain,
        ))
}
