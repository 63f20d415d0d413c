use crate::capability::CloudTypes;
use crate::schema::{FieldRole, FieldSpec, ResourceSchema};
use crate::validate::Rule;
use crate::value::FieldType;

/// Every credential change goes through one `edit_account` call.
const EDIT: FieldRole = FieldRole::Setting {
    operation: "edit_account",
};

pub(super) fn schema() -> ResourceSchema {
    use FieldType::{Bool, Int, Str};

    let aws = CloudTypes::AWS_RELATED;
    let azure = CloudTypes::AZURE_RELATED;
    let gcp = CloudTypes::GCP_RELATED;
    let oci = CloudTypes::OCI_RELATED;

    ResourceSchema::new("account", "account_name", CloudTypes::CLOUD)
        .fields([
            FieldSpec::new("cloud_type", Int, FieldRole::CreateOnly).required(),
            FieldSpec::new("aws_account_number", Str, EDIT),
            FieldSpec::new("aws_iam", Bool, EDIT),
            FieldSpec::new("aws_role_app", Str, EDIT),
            FieldSpec::new("aws_role_ec2", Str, EDIT),
            FieldSpec::new("aws_access_key", Str, EDIT),
            FieldSpec::new("aws_secret_key", Str, EDIT),
            FieldSpec::new("gcloud_project_id", Str, EDIT),
            FieldSpec::new("gcloud_project_credentials_filepath", Str, EDIT),
            FieldSpec::new("arm_subscription_id", Str, EDIT),
            FieldSpec::new("arm_directory_id", Str, EDIT),
            FieldSpec::new("arm_application_id", Str, EDIT),
            FieldSpec::new("arm_application_key", Str, EDIT),
            FieldSpec::new("oci_tenancy_id", Str, EDIT),
            FieldSpec::new("oci_user_id", Str, EDIT),
            FieldSpec::new("oci_compartment_id", Str, EDIT),
            FieldSpec::new("oci_api_private_key_filepath", Str, EDIT),
            FieldSpec::new("audit_account", Bool, FieldRole::Toggle {
                enable: "enable_account_audit",
                disable: "disable_account_audit",
            }),
            FieldSpec::new("aws_gateway_role_app", Str, FieldRole::Computed),
        ])
        .rules([
            Rule::cloud_scoped("aws_account_number", aws),
            Rule::cloud_scoped("aws_iam", aws),
            Rule::cloud_scoped("aws_access_key", aws),
            Rule::cloud_scoped("aws_role_app", aws),
            Rule::cloud_scoped("gcloud_project_id", gcp),
            Rule::cloud_scoped("arm_subscription_id", azure),
            Rule::cloud_scoped("oci_tenancy_id", oci),
            Rule::required_on("aws_account_number", aws),
            Rule::required_on("gcloud_project_id", gcp),
            Rule::required_on("gcloud_project_credentials_filepath", gcp),
            Rule::required_on("arm_subscription_id", azure),
            Rule::required_on("arm_directory_id", azure),
            Rule::required_on("arm_application_id", azure),
            Rule::required_on("arm_application_key", azure),
            Rule::required_on("oci_tenancy_id", oci),
            Rule::required_on("oci_user_id", oci),
            Rule::required_on("oci_compartment_id", oci),
            Rule::required_on("oci_api_private_key_filepath", oci),
            // access keys and role based auth carry the same meaning
            Rule::exclusive("aws_access_key", "aws_role_app"),
            Rule::forbids("aws_iam", "aws_access_key"),
            Rule::requires("aws_access_key", &["aws_secret_key"]),
            Rule::requires("aws_secret_key", &["aws_access_key"]),
            Rule::requires("aws_role_ec2", &["aws_role_app"]),
            Rule::required_on_when("aws_role_app", aws, "aws_iam"),
        ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::DesiredConfig;
    use crate::validate::{ViolationKind, validate};
    use crate::value::FieldValue;

    fn aws() -> DesiredConfig {
        DesiredConfig::new("account", "main")
            .with("cloud_type", FieldValue::Int(1))
            .with("aws_account_number", FieldValue::str("123456789012"))
    }

    fn first(cfg: &DesiredConfig) -> Option<ViolationKind> {
        validate(&schema(), cfg, cfg.cloud_type())
            .err()
            .and_then(|e| match e {
                crate::error::CloudError::Validation(v) => Some(v.kind),
                _ => None,
            })
    }

    #[test]
    fn test_access_key_excludes_role() {
        let cfg = aws()
            .with("aws_access_key", FieldValue::str("AKIA"))
            .with("aws_secret_key", FieldValue::str("secret"))
            .with("aws_role_app", FieldValue::str("arn:aws:iam::1:role/app"));
        assert_eq!(first(&cfg), Some(ViolationKind::MutuallyExclusive));
    }

    #[test]
    fn test_key_pair_is_complete() {
        let cfg = aws().with("aws_access_key", FieldValue::str("AKIA"));
        assert_eq!(first(&cfg), Some(ViolationKind::ConditionalRequirement));
        let cfg = cfg.with("aws_secret_key", FieldValue::str("secret"));
        assert_eq!(first(&cfg), None);
    }

    #[test]
    fn test_azure_fields_on_aws() {
        let cfg = aws().with("arm_subscription_id", FieldValue::str("sub"));
        assert_eq!(first(&cfg), Some(ViolationKind::CloudScope));
    }

    #[test]
    fn test_iam_account_needs_role() {
        let cfg = aws().with("aws_iam", FieldValue::Bool(true));
        assert_eq!(first(&cfg), Some(ViolationKind::Required));
    }
}
