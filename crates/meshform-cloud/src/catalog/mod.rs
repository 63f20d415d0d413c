//! Resource family catalog
//!
//! Each family is plain data: its fields, rules, HA pairing and token
//! bindings. Adding a family means adding a schema here, never a branch in
//! the engine.

mod account;
mod firewall;
mod gateway;
mod transit;
mod vpc;

use crate::schema::ResourceSchema;
use std::sync::LazyLock;

static CATALOG: LazyLock<Vec<ResourceSchema>> = LazyLock::new(|| {
    vec![
        account::schema(),
        vpc::schema(),
        gateway::schema(),
        transit::schema(),
        firewall::schema(),
    ]
});

/// All known families, in dependency order.
pub fn families() -> &'static [ResourceSchema] {
    &CATALOG
}

/// Family by resource file name, e.g. `transit_gateway`.
pub fn family(name: &str) -> Option<&'static ResourceSchema> {
    CATALOG.iter().find(|s| s.family == name)
}

/// Family owning a remote kind, either as primary or as HA secondary.
pub fn by_remote_kind(kind: &str) -> Option<&'static ResourceSchema> {
    CATALOG
        .iter()
        .find(|s| s.remote_kind == kind || s.ha.as_ref().is_some_and(|ha| ha.kind == kind))
}
