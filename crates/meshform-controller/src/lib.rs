//! Controller provider for Meshform
//!
//! Implements [`meshform_cloud::RemoteOperations`] against the controller's
//! action-style JSON API.
//!
//! # Example
//!
//! ```ignore
//! use meshform_controller::ControllerClient;
//! use meshform_cloud::Reconciler;
//!
//! let client = ControllerClient::new(url, "admin", password, true)?;
//! client.login().await?;
//!
//! let reconciler = Reconciler::for_config(&desired)?;
//! let report = reconciler.reconcile(&client, &desired, &cancel).await?;
//! ```

pub mod client;
pub mod error;
pub mod provider;

pub use client::ControllerClient;
pub use error::{ControllerError, Result};
