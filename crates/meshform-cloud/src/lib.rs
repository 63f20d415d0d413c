//! Meshform reconciliation engine
//!
//! Validates desired resource records against a cloud capability matrix,
//! diffs them against the controller's last reported state, and turns the
//! difference into an ordered list of remote operations.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  meshform CLI                    │
//! │         (validate / plan / apply / destroy)      │
//! └─────────────────┬───────────────────────────────┘
//!                   │ DesiredConfig
//! ┌─────────────────▼───────────────────────────────┐
//! │                 meshform-cloud                   │
//! │  ┌──────────┐ ┌──────────┐ ┌─────────────────┐  │
//! │  │ validate │ │   diff   │ │  ha (pairing)   │  │
//! │  └──────────┘ └──────────┘ └─────────────────┘  │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │      Reconciler  (plan → apply)          │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌────────────┐ ┌────────────┐ ┌───────────┐   │
//! │  │ capability │ │   token    │ │  catalog  │   │
//! │  └────────────┘ └────────────┘ └───────────┘   │
//! └─────────────────┬───────────────────────────────┘
//!                   │ trait RemoteOperations
//! ┌─────────────────▼───────────────────────────────┐
//! │              meshform-controller                 │
//! │            (HTTP, action-style API)              │
//! └─────────────────────────────────────────────────┘
//! ```

pub mod action;
pub mod capability;
pub mod catalog;
pub mod diff;
pub mod error;
pub mod ha;
pub mod reconcile;
pub mod record;
pub mod remote;
pub mod schema;
pub mod state;
pub mod token;
pub mod validate;
pub mod value;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-exports
pub use action::{ApplyReport, Operation, OperationClass, Plan, PlanSummary, RemoteCall, Target};
pub use capability::{CloudType, CloudTypes, supports};
pub use diff::{ChangeSet, FieldChange, diff};
pub use error::{CloudError, Result};
pub use ha::{HaPair, HaState};
pub use reconcile::Reconciler;
pub use record::{DesiredConfig, ObservedState};
pub use remote::{FieldDelta, RemoteError, RemoteOperations, RetryConfig, Snapshot};
pub use schema::{FieldRole, FieldSpec, HaSpec, ResourceSchema, TokenBinding};
pub use state::{StateFile, StateLock, StateManager, StoredResource};
pub use token::TokenFamily;
pub use validate::{Rule, Violation, ViolationKind, validate, violations};
pub use value::{Equality, FieldType, FieldValue, Record, RecordSpec};
