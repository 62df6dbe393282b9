//! SCIM filter support for data-source lookups.
//!
//! PingOne list endpoints accept RFC 7644 filter expressions. This module only
//! builds them; parsing and evaluation happen server-side.

pub mod filter;

pub use filter::{FilterError, FilterGroup, VALUE_PLACEHOLDER, build_scim_filter, parse_data_filter};
