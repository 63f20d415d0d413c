//! HA pairing state machine
//!
//! ```text
//!   Absent ──▶ Enabling ──▶ Present ──▶ Resizing ──▶ Present
//!     ▲                        │
//!     └────── Disabling ◀──────┘
//! ```
//!
//! Transitional states only live for one reconciliation pass. Nothing is
//! persisted: the next pass derives the state again from what the
//! controller reports.

use crate::diff::ChangeSet;
use crate::record::{DesiredConfig, ObservedState};
use crate::schema::HaSpec;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HaState {
    /// No HA fields set and no secondary known to exist.
    #[default]
    Absent,
    /// HA fields set, secondary not yet observed.
    Enabling,
    /// Secondary observed and HA fields set.
    Present,
    /// Present, with size or placement fields changed.
    Resizing,
    /// HA fields cleared, secondary still observed.
    Disabling,
}

impl HaState {
    /// State the pass ends in once its secondary operations ran.
    ///
    /// When they did not all commit the transitional state is kept, so the
    /// next pass retries only the secondary.
    pub fn settle(self, completed: bool) -> HaState {
        match (self, completed) {
            (HaState::Enabling | HaState::Resizing, true) => HaState::Present,
            (HaState::Disabling, true) => HaState::Absent,
            (state, _) => state,
        }
    }

    pub fn is_transitional(self) -> bool {
        matches!(
            self,
            HaState::Enabling | HaState::Resizing | HaState::Disabling
        )
    }
}

impl fmt::Display for HaState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HaState::Absent => "absent",
            HaState::Enabling => "enabling",
            HaState::Present => "present",
            HaState::Resizing => "resizing",
            HaState::Disabling => "disabling",
        };
        f.write_str(s)
    }
}

/// A primary and its (possibly absent) secondary for one pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HaPair {
    pub primary: String,
    /// Name of the secondary, derived from the primary by suffix.
    pub secondary: String,
    pub state: HaState,
    /// Placement changed: the secondary is deleted and created again.
    pub recreate: bool,
    /// Only the size changed: the secondary is resized in place.
    pub resize: bool,
}

impl HaPair {
    /// Derive the pass's HA transition.
    ///
    /// HA is wanted when any trigger field is set in `desired`; it exists when
    /// the controller reported a secondary or any trigger field.
    pub fn evaluate(
        spec: &HaSpec,
        observed: Option<&ObservedState>,
        desired: &DesiredConfig,
        changes: &ChangeSet,
    ) -> Self {
        let wanted = spec.triggers.iter().any(|t| desired.is_set(t));
        let exists = secondary_exists(spec, observed);

        let recreate = exists && wanted && spec.placement.iter().any(|f| changes.contains(f));
        let resize = exists && wanted && !recreate && changes.contains(spec.size_field);

        let state = match (wanted, exists) {
            (false, false) => HaState::Absent,
            (true, false) => HaState::Enabling,
            (false, true) => HaState::Disabling,
            (true, true) if recreate || resize => HaState::Resizing,
            (true, true) => HaState::Present,
        };

        let secondary = observed
            .and_then(ObservedState::secondary)
            .map(str::to_string)
            .unwrap_or_else(|| spec.secondary_name(desired.name()));

        tracing::debug!(
            primary = desired.name(),
            %state,
            recreate,
            resize,
            "ha transition"
        );

        Self {
            primary: desired.name().to_string(),
            secondary,
            state,
            recreate,
            resize,
        }
    }
}

/// Whether the controller reports a secondary, by marker or by HA fields.
pub fn secondary_exists(spec: &HaSpec, observed: Option<&ObservedState>) -> bool {
    observed.is_some_and(|o| o.secondary().is_some() || spec.triggers.iter().any(|t| o.is_set(t)))
}
