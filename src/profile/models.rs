// src/profile/models.rs

use serde::{Deserialize, Serialize};

use crate::session::models::{Role, User};

// ============================================================================
// Profile View Models
// ============================================================================

/// Where a resolved profile came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileSource {
    /// The full `users/{id}` document
    Store,
    /// The `public_profiles/{id}` projection
    PublicProfile,
    /// The local fallback cache
    Cache,
    /// Synthesized from what the caller already knew
    Placeholder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileSection {
    Overview,
    Skills,
    Portfolio,
    Contact,
}

/// Partial data the caller already has, e.g. from a list row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileHint {
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl ProfileHint {
    pub fn new(display_name: impl Into<String>, avatar_url: Option<String>) -> Self {
        Self {
            display_name: Some(display_name.into()),
            avatar_url,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProfileView {
    pub user: User,
    pub source: ProfileSource,
    /// Sensitive sections are hidden
    pub restricted: bool,
}

impl ProfileView {
    pub fn full(user: User, source: ProfileSource) -> Self {
        Self {
            user,
            source,
            restricted: false,
        }
    }

    /// A restricted view never carries the sensitive fields, whatever the
    /// source had
    pub fn restricted(mut user: User, source: ProfileSource) -> Self {
        user.email = None;
        user.skills.clear();
        user.portfolio.clear();
        user.contact_links.clear();
        Self {
            user,
            source,
            restricted: true,
        }
    }

    pub fn shows(&self, section: ProfileSection) -> bool {
        !self.restricted || section == ProfileSection::Overview
    }
}

// ============================================================================
// Public Projection
// ============================================================================

/// The `public_profiles/{id}` document: what any signed-in user may read
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PublicProfile {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
}

impl From<&User> for PublicProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            display_name: user.display_name.clone(),
            avatar_url: user.avatar_url.clone(),
            role: user.role,
            company: user.company.clone(),
            location: user.location.clone(),
            bio: user.bio.clone(),
        }
    }
}

impl From<PublicProfile> for User {
    fn from(profile: PublicProfile) -> Self {
        Self {
            id: profile.id,
            display_name: profile.display_name,
            avatar_url: profile.avatar_url,
            role: profile.role,
            company: profile.company,
            location: profile.location,
            bio: profile.bio,
            ..Default::default()
        }
    }
}

// ============================================================================
// Request Models
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub company: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub skills: Option<Vec<String>>,
    pub hourly_rate: Option<f64>,
    pub portfolio: Option<Vec<String>>,
    pub contact_links: Option<Vec<String>>,
}
