//! Session and presence
//!
//! Wraps the identity provider, keeps the current session in a watch
//! channel and maintains the user's online / last-seen flags.

pub mod models;
pub mod services;


pub use models::{Role, Session, User};
pub use services::{PresenceService, SessionManager};
