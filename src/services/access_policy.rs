use crate::db::types::UserRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DashboardAccess {
    Allow,
    Redirect(&'static str),
}

pub(crate) fn home_path(role: UserRole) -> &'static str {
    match role {
        UserRole::Student => "/dashboard/student",
        UserRole::Teacher => "/dashboard/teacher",
        UserRole::Admin => "/dashboard/admin",
        UserRole::Institution => "/dashboard/institution",
        UserRole::Dev => "/dashboard/dev",
    }
}

/// Users see their own dashboard; dev may open any of them.
pub(crate) fn authorize_dashboard(role: UserRole, requested: UserRole) -> DashboardAccess {
    if role == requested || role == UserRole::Dev {
        DashboardAccess::Allow
    } else {
        DashboardAccess::Redirect(home_path(role))
    }
}

pub(crate) fn can_manage_users(role: UserRole) -> bool {
    matches!(role, UserRole::Admin | UserRole::Dev)
}

pub(crate) fn can_evaluate(role: UserRole) -> bool {
    matches!(role, UserRole::Teacher | UserRole::Admin | UserRole::Dev)
}

pub(crate) fn can_broadcast(role: UserRole) -> bool {
    matches!(role, UserRole::Admin | UserRole::Dev | UserRole::Institution)
}

/// Owners work on their evaluations; admin and dev may step in on any.
pub(crate) fn can_access_evaluation(role: UserRole, user_id: &str, owner_id: &str) -> bool {
    user_id == owner_id || matches!(role, UserRole::Admin | UserRole::Dev)
}
