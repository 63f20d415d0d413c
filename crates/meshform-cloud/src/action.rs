//! Operations, plans and apply reports

use crate::ha::{HaPair, HaState};
use crate::remote::Snapshot;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordering class of an operation. Used for ordering and logging only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationClass {
    /// Create, resize or delete a node
    Structural,
    /// Switch or setting on an existing node
    FeatureToggle,
    /// Tag/label update
    Tag,
}

impl fmt::Display for OperationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationClass::Structural => write!(f, "structural"),
            OperationClass::FeatureToggle => write!(f, "feature"),
            OperationClass::Tag => write!(f, "tag"),
        }
    }
}

/// Remote operations interface call an operation maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteCall {
    Create,
    Update,
    Delete,
}

/// Node of the HA pair an operation acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    Primary,
    Secondary,
}

/// One queued remote call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Controller operation name, e.g. `create_gateway` or `enable_vpc_dns_server`
    pub name: String,

    pub class: OperationClass,

    pub call: RemoteCall,

    pub target: Target,

    /// Remote kind the call is addressed to
    pub kind: String,

    /// Name of the node the call acts on
    pub key: String,

    /// Fields this operation resolves
    pub fields: Vec<String>,

    /// Wire payload, composite tokens already encoded
    pub payload: Snapshot,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} '{}'", self.name, self.kind, self.key)?;
        if !self.fields.is_empty() {
            write!(f, " ({})", self.fields.join(", "))?;
        }
        Ok(())
    }
}

/// Ordered operations for one resource instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub family: String,

    pub name: String,

    pub operations: Vec<Operation>,

    /// HA transition this plan carries out, for families with HA pairing
    pub ha: Option<HaPair>,

    /// Whether the plan has any changes
    pub has_changes: bool,
}

impl Plan {
    pub fn new(
        family: impl Into<String>,
        name: impl Into<String>,
        operations: Vec<Operation>,
        ha: Option<HaPair>,
    ) -> Self {
        let has_changes = !operations.is_empty();
        Self {
            family: family.into(),
            name: name.into(),
            operations,
            ha,
            has_changes,
        }
    }

    pub fn empty(family: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(family, name, Vec::new(), None)
    }

    /// Get operations by class
    pub fn operations_by_class(&self, class: OperationClass) -> Vec<&Operation> {
        self.operations.iter().filter(|o| o.class == class).collect()
    }

    /// HA state before any operation ran.
    pub fn ha_state(&self) -> Option<HaState> {
        self.ha.as_ref().map(|p| p.state)
    }

    /// Summary of the plan
    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            structural: self.operations_by_class(OperationClass::Structural).len(),
            feature: self.operations_by_class(OperationClass::FeatureToggle).len(),
            tag: self.operations_by_class(OperationClass::Tag).len(),
        }
    }
}

/// Summary of planned operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanSummary {
    pub structural: usize,
    pub feature: usize,
    pub tag: usize,
}

impl PlanSummary {
    pub fn total(&self) -> usize {
        self.structural + self.feature + self.tag
    }
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} structural, {} feature, {} tag",
            self.structural, self.feature, self.tag
        )
    }
}

/// Result of a fully applied plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyReport {
    /// Names of the operations that committed, in order
    pub committed: Vec<String>,

    /// Id returned by the primary's create call
    pub remote_id: Option<String>,

    /// Settled HA state
    pub ha: Option<HaState>,

    /// Total execution time in milliseconds
    pub duration_ms: u64,
}

impl ApplyReport {
    pub fn is_noop(&self) -> bool {
        self.committed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(name: &str, class: OperationClass) -> Operation {
        Operation {
            name: name.to_string(),
            class,
            call: RemoteCall::Update,
            target: Target::Primary,
            kind: "gateway".to_string(),
            key: "gw-1".to_string(),
            fields: vec!["enable_nat".to_string()],
            payload: Snapshot::new(),
        }
    }

    #[test]
    fn test_plan_summary() {
        let plan = Plan::new(
            "gateway",
            "gw-1",
            vec![
                op("create_gateway", OperationClass::Structural),
                op("enable_snat", OperationClass::FeatureToggle),
                op("update_tags", OperationClass::Tag),
            ],
            None,
        );
        assert!(plan.has_changes);
        let summary = plan.summary();
        assert_eq!(summary.total(), 3);
        assert_eq!(summary.to_string(), "1 structural, 1 feature, 1 tag");
    }

    #[test]
    fn test_empty_plan() {
        let plan = Plan::empty("gateway", "gw-1");
        assert!(!plan.has_changes);
        assert_eq!(plan.summary().total(), 0);
    }

    #[test]
    fn test_operation_display() {
        let o = op("enable_snat", OperationClass::FeatureToggle);
        assert_eq!(o.to_string(), "enable_snat gateway 'gw-1' (enable_nat)");
    }
}
