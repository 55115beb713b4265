//! Resource abstraction layer
//!
//! This module provides a data-driven approach to managing DuploCloud
//! resources. Resource definitions (endpoints, identity, waits, timeouts and
//! the attribute schema) are loaded from JSON files at compile time; the typed
//! field mapping of each type lives in [`crate::kinds`].
//!
//! # Architecture
//!
//! - [`registry`] - Loads and caches resource definitions from embedded JSON
//! - [`schema`] - Validates declared attributes and diffs them against state
//! - [`engine`] - Generic Create/Read/Update/Delete for single objects
//! - [`collection`] - Create/Read/Update/Delete for keyed collections
//! - [`differ`] - Previous/desired reconciliation of keyed collections
//! - [`wait`] - Poll-until-ready with timeout and cancellation
//! - [`id`] - Composite identifier codec
//! - [`dispatch`] - Maps type names to engines
//! - [`state`] - Persisted resource records
//!
//! # Resource Definitions
//!
//! Resources are defined in JSON files under `src/resources/`:
//! - `tenant.json` - Tenants and tenant settings
//! - `plan.json` - Plan images and plan settings
//! - `aws.json` - AWS resource tags
//! - `gcp.json` - GCP Memorystore instances
//!
//! # Example
//!
//! ```ignore
//! use duplo_provider::resource::dispatch::operations;
//!
//! let ops = operations("duplocloud_aws_tag", &client, &cancel)?;
//! let applied = ops.create(&attrs).await?;
//! ```

pub mod collection;
pub mod differ;
pub mod dispatch;
pub mod engine;
pub mod id;
pub mod registry;
pub mod schema;
pub mod state;
pub mod wait;

pub use engine::Applied;
pub use registry::{get_all_resource_types, get_resource, require_resource};
