//! Session-related types.
//!
//! Types stored in the session for authentication state.

use serde::{Deserialize, Serialize};

use bazaar_core::{Email, UserId, UserRole};

/// Session-stored user identity.
///
/// Minimal data stored in the session to identify the logged-in user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
    /// Display name.
    pub name: String,
    /// Role at login time.
    pub role: UserRole,
    /// Set when an admin is acting as this user.
    pub impersonator: Option<Impersonator>,
}

/// The admin behind an impersonated session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Impersonator {
    pub id: UserId,
    pub email: Email,
    pub name: String,
}

impl CurrentUser {
    /// Whether this session may use the admin API.
    ///
    /// Impersonated sessions carry the target's identity, so they never do.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin && self.impersonator.is_none()
    }

    #[must_use]
    pub const fn is_impersonated(&self) -> bool {
        self.impersonator.is_some()
    }
}

/// Session keys for authentication data.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn user(role: UserRole) -> CurrentUser {
        CurrentUser {
            id: UserId::new(1),
            email: Email::parse("asha@example.in").unwrap(),
            name: "Asha".to_string(),
            role,
            impersonator: None,
        }
    }

    #[test]
    fn test_is_admin() {
        assert!(user(UserRole::Admin).is_admin());
        assert!(!user(UserRole::Customer).is_admin());
    }

    #[test]
    fn test_impersonated_admin_is_not_admin() {
        let mut session_user = user(UserRole::Admin);
        session_user.impersonator = Some(Impersonator {
            id: UserId::new(9),
            email: Email::parse("ops@example.in").unwrap(),
            name: "Ops".to_string(),
        });
        assert!(session_user.is_impersonated());
        assert!(!session_user.is_admin());
    }

    #[test]
    fn test_session_round_trip() {
        let original = user(UserRole::Customer);
        let json = serde_json::to_value(&original).unwrap();
        let back: CurrentUser = serde_json::from_value(json).unwrap();
        assert_eq!(back, original);
    }
}
