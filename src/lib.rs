//! Reconciliation core for managing PingOne Identity-as-a-Service entities as
//! declarative resources.
//!
//! The crate is organised leaves first:
//!
//! - [`config`]: provider configuration, region resolution, retry and logging settings
//! - [`client`]: token source, HTTP transport, retry engine, response classification
//! - [`framework`]: diagnostics, schema model, custom value types, plan modifiers and
//!   the response pipeline that turns PingOne errors into diagnostics
//! - [`scim`]: SCIM filter compilation for data-source lookups
//! - [`resource`]: the host contract (`Resource`, `DataSource`) and the type registry
//! - [`services`]: concrete resources built on the above

pub mod client;
pub mod config;
pub mod framework;
#[cfg(feature = "cli")]
pub mod observability;
pub mod resource;
pub mod scim;
pub mod services;

/// Product name sent in the `User-Agent` header.
pub const PRODUCT_NAME: &str = "pingone-provider";

/// Crate version sent in the `User-Agent` header.
pub const PRODUCT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prefix applied to every registered resource and data source type name.
pub const TYPE_NAME_PREFIX: &str = "pingone";
