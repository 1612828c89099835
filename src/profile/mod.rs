//! Profiles
//!
//! Resolving another user's profile with a fallback chain, the drawer that
//! shows it, and edits to the caller's own profile.

pub mod drawer;
pub mod models;
pub mod resolver;
pub mod services;
pub mod validators;

#[cfg(test)]
mod tests;

pub use drawer::ProfileDrawer;
pub use models::{
    ProfileHint, ProfileSection, ProfileSource, ProfileView, PublicProfile, UpdateProfileRequest,
};
pub use resolver::ProfileResolver;
pub use services::ProfileService;
