//! Resource kinds
//!
//! Typed local/remote shapes of each DuploCloud resource type and the field
//! mapping between them.

pub mod aws_tag;
pub mod common;
pub mod gcp_redis;
pub mod plan_images;
pub mod plan_settings;
pub mod tenant;
pub mod tenant_config;

pub use aws_tag::AwsTagKind;
pub use gcp_redis::RedisInstanceKind;
pub use plan_images::PlanImagesKind;
pub use plan_settings::PlanSettingsKind;
pub use tenant::TenantKind;
pub use tenant_config::TenantConfigKind;
