//! # Configuration System
//!
//! TOML-based configuration for the provider: the declared resource
//! set is parsed into model types, validated, and then handed to the
//! remote protocol for convergence.
//!
//! ## Example Configuration
//!
//! ```toml
//! [provider]
//! name = "edge"
//! default_scope = "CLOUDFRONT"
//!
//! [[web_acls]]
//! name = "edge-acl"
//! scope = "CLOUDFRONT"
//! default_action = "allow"
//!
//! [web_acls.visibility_config]
//! sampled_requests_enabled = false
//! cloud_watch_metrics_enabled = false
//! metric_name = "edge-acl"
//!
//! [[web_acls.rules]]
//! name = "block-admin"
//! priority = 0
//! action = "block"
//!
//! [web_acls.rules.statement.byte_match]
//! positional_constraint = "starts_with"
//! search_string = "/admin"
//! field_to_match = "uri_path"
//!
//! [[web_acls.rules.statement.byte_match.text_transformations]]
//! priority = 0
//! kind = "lowercase"
//!
//! [web_acls.rules.visibility_config]
//! sampled_requests_enabled = false
//! cloud_watch_metrics_enabled = false
//! metric_name = "block-admin"
//! ```

mod error;
mod loader;
mod types;
mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use types::{ProviderConfig, ProviderSettings};
pub use validation::{DeclaredResourcesValidator, Validator};
