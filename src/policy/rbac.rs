//! Role-based access control: a static table mapping each [`Role`] to its
//! permitted actions (spec.md §4.3). Same shape as the teacher's agent-role
//! dispatch table — a `None` allow-list means "all actions", an explicit
//! slice means "only these".

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Membership roles (spec.md §3 Membership entity).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Owner,
    Admin,
    Dispatcher,
    Finance,
    Viewer,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::Dispatcher => "dispatcher",
            Role::Finance => "finance",
            Role::Viewer => "viewer",
        };
        write!(f, "{s}")
    }
}

/// Static table mapping each role to its permitted action set.
/// `Owner` is `None` (all actions allowed).
pub const ROLE_ALLOWED_ACTIONS: &[(Role, Option<&[&str]>)] = &[
    (Role::Owner, None),
    (
        Role::Admin,
        Some(&[
            "booking.read",
            "booking.write",
            "invoice.read",
            "invoice.write",
            "lead.read",
            "lead.write",
            "photo.read",
            "photo.write",
            "iam.invite",
            "iam.reset",
            "outbox.read",
            "outbox.replay",
            "config.read",
        ]),
    ),
    (
        Role::Dispatcher,
        Some(&[
            "booking.read",
            "booking.write",
            "lead.read",
            "lead.write",
            "photo.read",
            "photo.write",
        ]),
    ),
    (
        Role::Finance,
        Some(&["invoice.read", "invoice.write", "booking.read"]),
    ),
    (
        Role::Viewer,
        Some(&["booking.read", "invoice.read", "lead.read", "photo.read"]),
    ),
];

/// Check whether `role` is authorized for `action`. Returns
/// `Err(AppError::Forbidden)` when denied so the caller can short-circuit
/// directly into the HTTP error envelope.
pub fn check_authorized(role: Role, action: &str) -> Result<(), AppError> {
    for (entry_role, allowed) in ROLE_ALLOWED_ACTIONS {
        if *entry_role != role {
            continue;
        }
        return match allowed {
            None => Ok(()),
            Some(actions) => {
                if actions.contains(&action) {
                    Ok(())
                } else {
                    Err(AppError::forbidden(format!(
                        "role {role} is not permitted to perform {action}"
                    )))
                }
            }
        };
    }
    Err(AppError::forbidden(format!("unknown role {role}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_can_do_everything() {
        assert!(check_authorized(Role::Owner, "anything.at.all").is_ok());
    }

    #[test]
    fn viewer_cannot_write_bookings() {
        let result = check_authorized(Role::Viewer, "booking.write");
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[test]
    fn finance_can_write_invoices_but_not_bookings() {
        assert!(check_authorized(Role::Finance, "invoice.write").is_ok());
        assert!(check_authorized(Role::Finance, "booking.write").is_err());
    }

    #[test]
    fn dispatcher_can_manage_bookings_and_leads() {
        assert!(check_authorized(Role::Dispatcher, "booking.write").is_ok());
        assert!(check_authorized(Role::Dispatcher, "lead.write").is_ok());
        assert!(check_authorized(Role::Dispatcher, "invoice.write").is_err());
    }
}
