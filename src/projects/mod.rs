//! Projects and applications
//!
//! Clients post projects, freelancers apply, and the owner hires one
//! applicant in a single atomic batch.

pub mod models;
pub mod services;
pub mod validators;

#[cfg(test)]
mod tests;

pub use models::{
    Application, ApplicationStatus, ApplyRequest, CreateProjectRequest, Project, ProjectStatus,
};
pub use services::{ApplicationService, ProjectService};
