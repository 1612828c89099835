// src/common/id_generator.rs
//! Crockford Base32 ID Generator
//!
//! Document ids are short, prefixed and human-readable: `PREFIX_XXXXXX`
//! (e.g. `P_K7NP3X` for a project). The alphabet excludes I, L, O and U.

use rand::Rng;

/// Crockford Base32 alphabet (excludes I, L, O, U to avoid confusion)
const CROCKFORD_ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// Entity type prefixes for ID generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityPrefix {
    /// User (U_)
    User,
    /// Project (P_)
    Project,
    /// Application / proposal (A_)
    Application,
    /// Notification (N_)
    Notification,
    /// Message (M_)
    Message,
    /// Invoice (V_) - V for Voucher
    Invoice,
    /// Any document added without a typed prefix (D_)
    Document,
}

impl EntityPrefix {
    /// Get the string prefix for this entity type
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityPrefix::User => "U",
            EntityPrefix::Project => "P",
            EntityPrefix::Application => "A",
            EntityPrefix::Notification => "N",
            EntityPrefix::Message => "M",
            EntityPrefix::Invoice => "V",
            EntityPrefix::Document => "D",
        }
    }

    /// Prefix used when a document is added to `collection` without an id
    pub fn for_collection(collection: &str) -> Self {
        match collection {
            "users" => EntityPrefix::User,
            "projects" => EntityPrefix::Project,
            "applications" => EntityPrefix::Application,
            "notifications" => EntityPrefix::Notification,
            "messages" => EntityPrefix::Message,
            "invoices" => EntityPrefix::Invoice,
            _ => EntityPrefix::Document,
        }
    }
}

/// Generate a random Crockford Base32 string of specified length
fn generate_crockford_string(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..32);
            CROCKFORD_ALPHABET[idx] as char
        })
        .collect()
}

/// Generate a prefixed ID, e.g. `generate_id(EntityPrefix::Project)` -> "P_K7NP3X"
///
/// Eight random characters keep collisions negligible for a single
/// collection (32^8 combinations).
pub fn generate_id(prefix: EntityPrefix) -> String {
    format!("{}_{}", prefix.as_str(), generate_crockford_string(8))
}

pub fn generate_user_id() -> String {
    generate_id(EntityPrefix::User)
}

pub fn generate_notification_id() -> String {
    generate_id(EntityPrefix::Notification)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_id_format() {
        let project_id = generate_id(EntityPrefix::Project);
        assert!(project_id.starts_with("P_"));
        assert_eq!(project_id.len(), 10); // "P_" + 8 chars
    }

    #[test]
    fn test_crockford_alphabet_only() {
        let id = generate_user_id();
        let random_part = &id[2..];

        for c in random_part.chars() {
            assert!(
                CROCKFORD_ALPHABET.contains(&(c as u8)),
                "Character '{}' not in Crockford alphabet",
                c
            );
        }
    }

    #[test]
    fn test_uniqueness() {
        let mut ids = HashSet::new();
        for _ in 0..1000 {
            assert!(ids.insert(generate_notification_id()), "Duplicate ID generated");
        }
    }

    #[test]
    fn test_collection_prefixes() {
        assert_eq!(EntityPrefix::for_collection("projects"), EntityPrefix::Project);
        assert_eq!(
            EntityPrefix::for_collection("applications"),
            EntityPrefix::Application
        );
        assert_eq!(EntityPrefix::for_collection("invoices").as_str(), "V");
        assert_eq!(EntityPrefix::for_collection("scratch").as_str(), "D");
    }
}
