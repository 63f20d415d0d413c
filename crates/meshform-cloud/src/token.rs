//! Composite token codec
//!
//! The controller packs a subnet CIDR together with its placement qualifiers
//! (availability zone, Azure zone, OCI availability/fault domain) into a
//! single `~~`-delimited string. This module is the only place that splits
//! or joins those strings.

use crate::error::{CloudError, Result};
use serde::{Deserialize, Serialize};

pub const DELIMITER: &str = "~~";

/// Join `base` and `qualifiers` with [`DELIMITER`].
///
/// Trailing empty qualifiers are dropped; a base with no remaining
/// qualifiers is returned as is. With `trailing` set, a qualified token also
/// ends with the delimiter.
pub fn encode(base: &str, qualifiers: &[&str], trailing: bool) -> String {
    let used = qualifiers
        .iter()
        .rposition(|q| !q.is_empty())
        .map(|last| &qualifiers[..=last])
        .unwrap_or(&[]);

    if used.is_empty() {
        return base.to_string();
    }

    let mut token = base.to_string();
    for q in used {
        token.push_str(DELIMITER);
        token.push_str(q);
    }
    if trailing {
        token.push_str(DELIMITER);
    }
    token
}

/// Split `token` into exactly `expected_parts` segments.
///
/// A single trailing empty segment (left by a trailing delimiter) is ignored.
pub fn decode(token: &str, expected_parts: usize) -> Result<Vec<String>> {
    let mut parts: Vec<&str> = token.split(DELIMITER).collect();
    if parts.len() == expected_parts + 1 && parts.last() == Some(&"") {
        parts.pop();
    }
    if parts.len() != expected_parts {
        return Err(malformed(token, expected_parts, parts.len()));
    }
    Ok(parts.into_iter().map(str::to_string).collect())
}

fn malformed(token: &str, expected: usize, found: usize) -> CloudError {
    CloudError::MalformedToken {
        token: token.to_string(),
        expected,
        found,
    }
}

/// Per-resource-family encoding rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenFamily {
    /// `subnet~~az` for insane mode gateways on AWS.
    InsaneModeAz,
    /// `subnet~~zone~~` for zonal Azure gateways. The trailing delimiter is
    /// part of the wire format.
    AzureZone,
    /// `subnet~~availability_domain~~fault_domain` for OCI gateways.
    OciDomain,
}

impl TokenFamily {
    /// Number of parts including the base.
    pub fn parts(self) -> usize {
        match self {
            TokenFamily::InsaneModeAz | TokenFamily::AzureZone => 2,
            TokenFamily::OciDomain => 3,
        }
    }

    fn trailing_delimiter(self) -> bool {
        matches!(self, TokenFamily::AzureZone)
    }

    /// Join `base` and `qualifiers` with the family's delimiter rule.
    ///
    /// Values must not contain `~~` or end in a single `~`: the delimiter is
    /// then ambiguous and [`TokenFamily::decode`] splits at the wrong place.
    pub fn encode(self, base: &str, qualifiers: &[&str]) -> String {
        debug_assert!(qualifiers.len() < self.parts());
        encode(base, qualifiers, self.trailing_delimiter())
    }

    /// Decode a token produced by [`TokenFamily::encode`].
    ///
    /// Always yields [`TokenFamily::parts`] values: qualifiers the encoder
    /// omitted come back empty. A plain, undelimited token is the base alone.
    pub fn decode(self, token: &str) -> Result<Vec<String>> {
        let expected = self.parts();
        if !token.contains(DELIMITER) {
            let mut parts = vec![token.to_string()];
            parts.resize(expected, String::new());
            return Ok(parts);
        }

        let mut parts: Vec<&str> = token.split(DELIMITER).collect();
        if self.trailing_delimiter() {
            if parts.last() != Some(&"") {
                return Err(malformed(token, expected, parts.len()));
            }
            parts.pop();
        }
        if parts.len() > expected {
            return Err(malformed(token, expected, parts.len()));
        }

        let mut parts: Vec<String> = parts.into_iter().map(str::to_string).collect();
        parts.resize(expected, String::new());
        Ok(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_azure_zone_keeps_trailing_delimiter() {
        let token = TokenFamily::AzureZone.encode("10.0.1.0/24", &["az-2"]);
        assert_eq!(token, "10.0.1.0/24~~az-2~~");

        let parts = decode(&token, 2).unwrap();
        assert_eq!(parts, vec!["10.0.1.0/24", "az-2"]);
    }

    #[test]
    fn test_insane_mode_has_no_trailing_delimiter() {
        let token = TokenFamily::InsaneModeAz.encode("10.0.0.0/26", &["us-east-1a"]);
        assert_eq!(token, "10.0.0.0/26~~us-east-1a");
    }

    #[test]
    fn test_empty_qualifiers_leave_plain_base() {
        assert_eq!(TokenFamily::AzureZone.encode("10.0.1.0/24", &[""]), "10.0.1.0/24");
        assert_eq!(
            TokenFamily::OciDomain.encode("10.0.1.0/24", &["ad-1", ""]),
            "10.0.1.0/24~~ad-1"
        );
        assert_eq!(
            TokenFamily::OciDomain.decode("10.0.1.0/24~~ad-1").unwrap(),
            vec!["10.0.1.0/24", "ad-1", ""]
        );
    }

    #[test]
    fn test_inner_empty_qualifier_is_kept() {
        let token = TokenFamily::OciDomain.encode("10.0.1.0/24", &["", "fd-2"]);
        assert_eq!(token, "10.0.1.0/24~~~~fd-2");
        assert_eq!(
            TokenFamily::OciDomain.decode(&token).unwrap(),
            vec!["10.0.1.0/24", "", "fd-2"]
        );
    }

    #[test]
    fn test_trailing_tilde_shifts_into_next_part() {
        let token = TokenFamily::InsaneModeAz.encode("x~", &["y"]);
        assert_eq!(token, "x~~~y");
        assert_eq!(
            TokenFamily::InsaneModeAz.decode(&token).unwrap(),
            vec!["x", "~y"]
        );
    }

    #[test]
    fn test_decode_rejects_wrong_part_count() {
        let err = decode("a~~b~~c", 2).unwrap_err();
        assert!(matches!(
            err,
            CloudError::MalformedToken {
                expected: 2,
                found: 3,
                ..
            }
        ));
        assert!(decode("a", 2).is_err());
    }

    #[test]
    fn test_wrong_family_is_rejected() {
        // insane mode token read with the Azure rule lacks the trailing delimiter
        let insane = TokenFamily::InsaneModeAz.encode("10.0.0.0/26", &["us-east-1a"]);
        assert!(TokenFamily::AzureZone.decode(&insane).is_err());

        // Azure token read with the insane mode rule has one segment too many
        let azure = TokenFamily::AzureZone.encode("10.0.1.0/24", &["1"]);
        assert!(TokenFamily::InsaneModeAz.decode(&azure).is_err());

        let oci = TokenFamily::OciDomain.encode("10.0.1.0/24", &["ad-1", "fd-1"]);
        assert!(TokenFamily::InsaneModeAz.decode(&oci).is_err());
    }

    fn segment() -> impl Strategy<Value = String> {
        "[ -}]{1,16}".prop_filter("no delimiter", |s| !s.contains(DELIMITER) && !s.ends_with('~'))
    }

    proptest! {
        #[test]
        fn two_part_round_trip(a in segment(), b in segment()) {
            let token = encode(&a, &[&b], false);
            prop_assert_eq!(decode(&token, 2).unwrap(), vec![a, b]);
        }

        #[test]
        fn family_round_trip(a in segment(), b in "[a-z0-9-]{0,8}", c in "[a-z0-9-]{0,8}") {
            let token = TokenFamily::OciDomain.encode(&a, &[&b, &c]);
            prop_assert_eq!(TokenFamily::OciDomain.decode(&token).unwrap(), vec![a, b, c]);
        }
    }
}
