//! Cloud type identifiers and capability unions
//!
//! Every cloud provider/region variant the controller knows about is a single
//! bit. Capability checks are a bitwise AND against a union of those bits, so
//! a cloud type outside every known bit fails every check.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;

/// A single cloud provider/region variant, as the controller encodes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CloudType(u32);

impl CloudType {
    /// Placeholder for a record that carries no cloud type at all.
    pub const UNSET: CloudType = CloudType(0);

    pub const AWS: CloudType = CloudType(1);
    pub const GCP: CloudType = CloudType(4);
    pub const AZURE: CloudType = CloudType(8);
    pub const OCI: CloudType = CloudType(16);
    pub const AZURE_GOV: CloudType = CloudType(32);
    pub const AWS_GOV: CloudType = CloudType(256);
    pub const AWS_CHINA: CloudType = CloudType(1024);
    pub const AZURE_CHINA: CloudType = CloudType(2048);
    pub const ALIBABA: CloudType = CloudType(8192);
    pub const AWS_TOP_SECRET: CloudType = CloudType(16384);
    pub const AWS_SECRET: CloudType = CloudType(32768);
    pub const EDGE_CSP: CloudType = CloudType(65536);
    pub const EDGE_NEO: CloudType = CloudType(262144);
    pub const EDGE_EQUINIX: CloudType = CloudType(524288);
    pub const EDGE_MEGAPORT: CloudType = CloudType(1048576);

    pub const fn from_raw(raw: u32) -> Self {
        CloudType(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Whether this value is exactly one of the known single-type constants.
    pub fn is_known(self) -> bool {
        KNOWN_TYPES.iter().any(|(t, _)| *t == self)
    }

    /// Human readable name, if known.
    pub fn name(self) -> Option<&'static str> {
        KNOWN_TYPES
            .iter()
            .find(|(t, _)| *t == self)
            .map(|(_, name)| *name)
    }

    /// Pure bitwise membership test. See [`supports`].
    pub fn supports(self, union: CloudTypes) -> bool {
        supports(self, union)
    }
}

impl fmt::Display for CloudType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} ({})", name, self.0),
            None => write!(f, "unknown ({})", self.0),
        }
    }
}

const KNOWN_TYPES: &[(CloudType, &str)] = &[
    (CloudType::AWS, "AWS"),
    (CloudType::GCP, "GCP"),
    (CloudType::AZURE, "Azure"),
    (CloudType::OCI, "OCI"),
    (CloudType::AZURE_GOV, "AzureGov"),
    (CloudType::AWS_GOV, "AWSGov"),
    (CloudType::AWS_CHINA, "AWSChina"),
    (CloudType::AZURE_CHINA, "AzureChina"),
    (CloudType::ALIBABA, "AliCloud"),
    (CloudType::AWS_TOP_SECRET, "AWS Top Secret"),
    (CloudType::AWS_SECRET, "AWS Secret"),
    (CloudType::EDGE_CSP, "Edge CSP"),
    (CloudType::EDGE_NEO, "Edge NEO"),
    (CloudType::EDGE_EQUINIX, "Edge Equinix"),
    (CloudType::EDGE_MEGAPORT, "Edge Megaport"),
];

/// Bitwise union of [`CloudType`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CloudTypes(u32);

impl CloudTypes {
    pub const NONE: CloudTypes = CloudTypes(0);

    pub const AWS_RELATED: CloudTypes = CloudTypes::of(&[
        CloudType::AWS,
        CloudType::AWS_GOV,
        CloudType::AWS_CHINA,
        CloudType::AWS_TOP_SECRET,
        CloudType::AWS_SECRET,
    ]);
    pub const AZURE_RELATED: CloudTypes =
        CloudTypes::of(&[CloudType::AZURE, CloudType::AZURE_GOV, CloudType::AZURE_CHINA]);
    pub const GCP_RELATED: CloudTypes = CloudTypes::of(&[CloudType::GCP]);
    pub const OCI_RELATED: CloudTypes = CloudTypes::of(&[CloudType::OCI]);
    pub const ALI_RELATED: CloudTypes = CloudTypes::of(&[CloudType::ALIBABA]);
    pub const EDGE_RELATED: CloudTypes = CloudTypes::of(&[
        CloudType::EDGE_CSP,
        CloudType::EDGE_NEO,
        CloudType::EDGE_EQUINIX,
        CloudType::EDGE_MEGAPORT,
    ]);

    /// Every public and government cloud, edge excluded.
    pub const CLOUD: CloudTypes = CloudTypes(
        Self::AWS_RELATED.0
            | Self::AZURE_RELATED.0
            | Self::GCP_RELATED.0
            | Self::OCI_RELATED.0
            | Self::ALI_RELATED.0,
    );

    pub const ALL: CloudTypes = CloudTypes(Self::CLOUD.0 | Self::EDGE_RELATED.0);

    pub const fn of(types: &[CloudType]) -> Self {
        let mut bits = 0;
        let mut i = 0;
        while i < types.len() {
            bits |= types[i].0;
            i += 1;
        }
        CloudTypes(bits)
    }

    pub const fn union(self, other: CloudTypes) -> Self {
        CloudTypes(self.0 | other.0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Names of the known members, in declaration order.
    pub fn names(self) -> Vec<&'static str> {
        KNOWN_TYPES
            .iter()
            .filter(|(t, _)| self.0 & t.0 != 0)
            .map(|(_, name)| *name)
            .collect()
    }
}

impl fmt::Display for CloudTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.names().join(", "))
    }
}

impl From<CloudType> for CloudTypes {
    fn from(t: CloudType) -> Self {
        CloudTypes(t.0)
    }
}

impl BitOr for CloudType {
    type Output = CloudTypes;

    fn bitor(self, rhs: CloudType) -> CloudTypes {
        CloudTypes(self.0 | rhs.0)
    }
}

impl BitOr<CloudType> for CloudTypes {
    type Output = CloudTypes;

    fn bitor(self, rhs: CloudType) -> CloudTypes {
        CloudTypes(self.0 | rhs.0)
    }
}

impl BitOr for CloudTypes {
    type Output = CloudTypes;

    fn bitor(self, rhs: CloudTypes) -> CloudTypes {
        self.union(rhs)
    }
}

/// `true` when `cloud` is a known single type that is a member of `union`.
///
/// Values that are not exactly one known bit (zero, unassigned bits, or
/// several bits OR-ed together) have no capabilities.
pub fn supports(cloud: CloudType, union: CloudTypes) -> bool {
    cloud.is_known() && union.0 & cloud.0 != 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_single_type_membership() {
        assert!(supports(CloudType::AWS, CloudTypes::AWS_RELATED));
        assert!(supports(CloudType::AWS_GOV, CloudTypes::AWS_RELATED));
        assert!(!supports(CloudType::AZURE, CloudTypes::AWS_RELATED));
        assert!(supports(CloudType::AZURE_CHINA, CloudTypes::AZURE_RELATED));
        assert!(supports(CloudType::OCI, CloudType::OCI.into()));
    }

    #[test]
    fn test_union_operators() {
        let union = CloudType::AWS | CloudType::AWS_GOV | CloudType::AWS_CHINA;
        assert!(supports(CloudType::AWS_CHINA, union));
        assert!(!supports(CloudType::AWS_SECRET, union));

        let wider = union | CloudTypes::GCP_RELATED;
        assert!(supports(CloudType::GCP, wider));
    }

    #[test]
    fn test_combined_bits_are_not_a_cloud_type() {
        // AWS | GCP as a single "type" must not pass as AWS
        let bogus = CloudType::from_raw(CloudType::AWS.raw() | CloudType::GCP.raw());
        assert!(!bogus.is_known());
        assert!(!supports(bogus, CloudTypes::ALL));
    }

    #[test]
    fn test_unset_has_no_capabilities() {
        assert!(!supports(CloudType::UNSET, CloudTypes::ALL));
    }

    #[test]
    fn test_display() {
        assert_eq!(CloudType::AZURE.to_string(), "Azure (8)");
        assert_eq!(CloudType::from_raw(2).to_string(), "unknown (2)");
        assert_eq!(CloudTypes::AZURE_RELATED.to_string(), "Azure, AzureGov, AzureChina");
    }

    proptest! {
        #[test]
        fn unknown_types_fail_every_union(raw in any::<u32>(), union in any::<u32>()) {
            let cloud = CloudType::from_raw(raw);
            prop_assume!(!cloud.is_known());
            prop_assert!(!supports(cloud, CloudTypes(union)));
        }

        #[test]
        fn supports_is_deterministic(raw in any::<u32>()) {
            let cloud = CloudType::from_raw(raw);
            prop_assert_eq!(
                supports(cloud, CloudTypes::ALL),
                supports(cloud, CloudTypes::ALL)
            );
        }
    }
}
