//! Declarative provider for the DuploCloud management API
//!
//! Resources are declared in a YAML manifest, validated against the schemas in
//! [`resource::registry`], and converged through the engines in
//! [`resource::engine`] and [`resource::collection`]. The outcome of each
//! operation is recorded in a local state file.

pub mod apply;
pub mod config;
pub mod duplo;
pub mod error;
pub mod kinds;
pub mod manifest;
pub mod resource;
