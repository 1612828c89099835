//! Client portal core
//!
//! Session and presence, notification batching and the profile fallback
//! chain, plus the project, messaging and invoice flows that feed them,
//! all running against an injected document store and identity provider.

pub mod common;
pub mod identity;
pub mod invoices;
pub mod messages;
pub mod notifications;
pub mod profile;
pub mod projects;
pub mod session;
pub mod store;

pub use common::{PortalConfig, PortalError, PortalResult, PortalState};
