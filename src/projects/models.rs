// src/projects/models.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

use crate::common::helpers::{
    deserialize_amount, deserialize_optional_timestamp, deserialize_string_list,
    deserialize_timestamp,
};

// ============================================================================
// Project Models
// ============================================================================

/// Project lifecycle status
///
/// Stored as display strings ("In Progress"); reading accepts any casing
/// and separator, and unknown values read as `Requested`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProjectStatus {
    #[default]
    Requested,
    InProgress,
    Completed,
    Pending,
    Assigned,
    Hired,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Requested => "Requested",
            ProjectStatus::InProgress => "In Progress",
            ProjectStatus::Completed => "Completed",
            ProjectStatus::Pending => "Pending",
            ProjectStatus::Assigned => "Assigned",
            ProjectStatus::Hired => "Hired",
        }
    }

    pub fn parse(value: &str) -> Self {
        let normalized: String = value
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();

        match normalized.as_str() {
            "inprogress" | "active" | "ongoing" => ProjectStatus::InProgress,
            "completed" | "complete" | "done" => ProjectStatus::Completed,
            "pending" => ProjectStatus::Pending,
            "assigned" => ProjectStatus::Assigned,
            "hired" => ProjectStatus::Hired,
            _ => ProjectStatus::Requested,
        }
    }

    /// Still looking for a freelancer
    pub fn is_open(&self) -> bool {
        matches!(self, ProjectStatus::Requested | ProjectStatus::Pending)
    }

    pub fn can_transition_to(&self, next: ProjectStatus) -> bool {
        use ProjectStatus::*;

        if *self == next {
            return true;
        }
        match self {
            Requested | Pending => matches!(next, Pending | Assigned | Hired | InProgress),
            Assigned | Hired => matches!(next, InProgress | Completed),
            InProgress => next == Completed,
            Completed => false,
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ProjectStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ProjectStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(Value::String(s)) => ProjectStatus::parse(&s),
            _ => ProjectStatus::Requested,
        })
    }
}

/// The `projects/{id}` document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub owner_id: String,
    #[serde(default)]
    pub freelancer_id: Option<String>,
    #[serde(default)]
    pub status: ProjectStatus,
    #[serde(default, deserialize_with = "deserialize_amount")]
    pub budget: f64,
    #[serde(default, deserialize_with = "deserialize_string_list")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub due_date: Option<DateTime<Utc>>,
}

// ============================================================================
// Application Models
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Accepted,
    Rejected,
    #[default]
    #[serde(other)]
    Applied,
}

/// The `applications/{id}` document: a freelancer's proposal for a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    #[serde(default)]
    pub id: String,
    pub project_id: String,
    pub freelancer_id: String,
    #[serde(default)]
    pub freelancer_name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_amount")]
    pub bid: f64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: ApplicationStatus,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Request Models
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateProjectRequest {
    pub title: String,
    pub description: String,
    pub budget: f64,
    #[serde(default)]
    pub tags: Vec<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplyRequest {
    pub project_id: String,
    pub bid: f64,
    pub message: String,
}
