//! # WAF Provider
//!
//! A declarative provider for web-application-firewall resources: web
//! ACLs and rule groups are described locally, validated, and converged
//! against a remote control plane.
//!
//! ## Features
//!
//! - Recursive rule-statement model with a lossless wire round-trip
//! - Collected validation with field-path-addressed errors
//! - Content-hash node identity for external diffing
//! - Optimistic-lock write protocol with a single conflict retry
//!
//! ## Architecture
//!
//! The model types in [`statement`], [`rule`], and [`acl`] are tagged
//! unions that make illegal trees unrepresentable; the flat, all-optional
//! wire forms exist only at the serialization boundary. [`config`] loads
//! declared resources from TOML, and [`remote`] defines the control-plane
//! protocol they are pushed through.

pub mod acl;
pub mod config;
pub mod identity;
pub mod remote;
pub mod rule;
pub mod statement;
pub mod validation;
