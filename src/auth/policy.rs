//! Static role → action permission table.

use tracing::warn;

use crate::{auth::jwt::AuthUser, error::ApiError, users::repo_types::UserRole};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ListUsers,
    CreateUser,
    ReadUser,
    UpdateUser,
    DeleteUser,
    UpgradeProfessional,
    UnlockUser,
    ManageOwnProfile,
}

pub fn permits(role: UserRole, action: Action) -> bool {
    use Action::*;
    use UserRole::*;

    match action {
        ListUsers | CreateUser => matches!(role, Admin | Manager),
        ReadUser | UpdateUser | DeleteUser | UpgradeProfessional | UnlockUser => role == Admin,
        ManageOwnProfile => matches!(role, Admin | Manager | Authenticated),
    }
}

impl AuthUser {
    /// Fails with `Forbidden` unless the caller's role allows `action`.
    pub fn require(&self, action: Action) -> Result<(), ApiError> {
        if permits(self.role, action) {
            return Ok(());
        }
        warn!(user_id = %self.id, role = %self.role, action = ?action, "action denied");
        Err(ApiError::forbidden())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    const ALL: [Action; 8] = [
        Action::ListUsers,
        Action::CreateUser,
        Action::ReadUser,
        Action::UpdateUser,
        Action::DeleteUser,
        Action::UpgradeProfessional,
        Action::UnlockUser,
        Action::ManageOwnProfile,
    ];

    #[test]
    fn admin_may_do_everything() {
        assert!(ALL.iter().all(|a| permits(UserRole::Admin, *a)));
    }

    #[test]
    fn anonymous_may_do_nothing() {
        assert!(ALL.iter().all(|a| !permits(UserRole::Anonymous, *a)));
    }

    #[test]
    fn manager_lists_and_creates_only() {
        let allowed: Vec<_> = ALL
            .iter()
            .copied()
            .filter(|a| permits(UserRole::Manager, *a))
            .collect();
        assert_eq!(
            allowed,
            vec![Action::ListUsers, Action::CreateUser, Action::ManageOwnProfile]
        );
    }

    #[test]
    fn authenticated_only_touches_own_profile() {
        let allowed: Vec<_> = ALL
            .iter()
            .copied()
            .filter(|a| permits(UserRole::Authenticated, *a))
            .collect();
        assert_eq!(allowed, vec![Action::ManageOwnProfile]);
    }

    #[test]
    fn require_maps_denial_to_forbidden() {
        let caller = AuthUser {
            id: Uuid::new_v4(),
            role: UserRole::Authenticated,
        };
        assert!(matches!(
            caller.require(Action::UpgradeProfessional),
            Err(ApiError::Forbidden(_))
        ));
        assert!(caller.require(Action::ManageOwnProfile).is_ok());
    }
}
