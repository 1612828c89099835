//! Access rules evaluated by the document stores
//!
//! The hosted backend enforces per-document rules against the signed-in
//! caller; stores evaluate an `AccessPolicy` before every read and write and
//! report `PortalError::PermissionDenied` when it refuses.

use serde_json::Value;

use super::models::Fields;
use crate::identity::models::AuthUser;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

/// What a rule gets to look at
pub struct AccessRequest<'a> {
    pub caller: Option<&'a AuthUser>,
    pub access: Access,
    pub collection: &'a str,
    pub id: &'a str,
    /// Stored document, if any
    pub existing: Option<&'a Fields>,
    /// Incoming data for writes
    pub incoming: Option<&'a Fields>,
}

pub trait AccessPolicy: Send + Sync {
    fn allows(&self, request: &AccessRequest<'_>) -> bool;
}

/// No rules at all; used by local caches and tests
pub struct AllowAll;

impl AccessPolicy for AllowAll {
    fn allows(&self, _request: &AccessRequest<'_>) -> bool {
        true
    }
}

/// Rules of the hosted portal backend
///
/// - `users/{id}`: read and write by the owner only
/// - `public_profiles/{id}`: read by anyone signed in, write by the owner
/// - `notifications`: created by anyone signed in; read, updated and
///   deleted by the recipient
/// - `messages`: sender and recipient only
/// - `invoices`: issuer and client only
/// - `accounts`: never; only the identity provider's own handle reaches it
/// - everything else: any signed-in caller
pub struct PortalRules;

impl PortalRules {
    fn field<'a>(request: &'a AccessRequest<'_>, key: &str) -> Option<&'a str> {
        request
            .existing
            .or(request.incoming)
            .and_then(|data| data.get(key))
            .and_then(Value::as_str)
    }

    fn is_party(request: &AccessRequest<'_>, uid: &str, keys: &[&str]) -> bool {
        // A missing document reads as empty, same as the hosted backend
        if request.existing.is_none() && request.incoming.is_none() {
            return request.access == Access::Read;
        }
        keys.iter()
            .any(|key| Self::field(request, key) == Some(uid))
    }
}

impl AccessPolicy for PortalRules {
    fn allows(&self, request: &AccessRequest<'_>) -> bool {
        let Some(caller) = request.caller else {
            return false;
        };
        let uid = caller.uid.as_str();

        match request.collection {
            "users" => request.id == uid,
            "public_profiles" => request.access == Access::Read || request.id == uid,
            "notifications" => match (request.access, request.existing) {
                (Access::Write, None) => true,
                _ => Self::is_party(request, uid, &["user_id"]),
            },
            "messages" => Self::is_party(request, uid, &["sender_id", "recipient_id"]),
            "invoices" => Self::is_party(request, uid, &["issuer_id", "client_id"]),
            "accounts" => false,
            _ => true,
        }
    }
}
