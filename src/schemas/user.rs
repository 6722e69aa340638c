use serde::{Deserialize, Serialize};

use crate::core::time::format_primitive;
use crate::db::models::Profile;
use crate::db::types::UserRole;

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct NewUserPayload {
    pub(crate) email: String,
    #[serde(alias = "displayName", alias = "name")]
    pub(crate) display_name: String,
    #[serde(default = "default_user_role")]
    pub(crate) role: UserRole,
    pub(crate) password: String,
}

/// Body of `POST /admin/users`: `{"action": "...", "data": {...}}`.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", content = "data", rename_all = "camelCase")]
pub(crate) enum AdminUserAction {
    Create(NewUserPayload),
    ResetPassword {
        #[serde(alias = "userId")]
        user_id: String,
        #[serde(alias = "newPassword")]
        new_password: String,
    },
    DeleteAuth {
        #[serde(alias = "userId")]
        user_id: String,
    },
    BulkCreate {
        users: Vec<NewUserPayload>,
    },
}

impl AdminUserAction {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::Create(_) => "create",
            Self::ResetPassword { .. } => "resetPassword",
            Self::DeleteAuth { .. } => "deleteAuth",
            Self::BulkCreate { .. } => "bulkCreate",
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserListQuery {
    #[serde(default)]
    pub(crate) role: Option<UserRole>,
    #[serde(default)]
    pub(crate) skip: Option<i64>,
    #[serde(default)]
    pub(crate) limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct UserResponse {
    pub(crate) id: String,
    pub(crate) email: String,
    pub(crate) display_name: String,
    pub(crate) role: UserRole,
    pub(crate) is_active: bool,
    pub(crate) created_at: String,
}

impl UserResponse {
    pub(crate) fn from_profile(profile: Profile) -> Self {
        Self {
            id: profile.id,
            email: profile.email,
            display_name: profile.display_name,
            role: profile.role,
            is_active: profile.is_active,
            created_at: format_primitive(profile.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct UserListResponse {
    pub(crate) items: Vec<UserResponse>,
    pub(crate) total: i64,
    pub(crate) skip: i64,
    pub(crate) limit: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct BulkFailure {
    pub(crate) index: usize,
    pub(crate) email: String,
    pub(crate) error: String,
}

/// Outcome of one bulk entry, in request order.
#[derive(Debug, Serialize)]
pub(crate) struct BulkResult {
    pub(crate) email: String,
    pub(crate) success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) error: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreatedUserResponse {
    pub(crate) success: bool,
    pub(crate) user: UserResponse,
}

#[derive(Debug, Serialize)]
pub(crate) struct BulkCreateResponse {
    pub(crate) success: bool,
    pub(crate) created: Vec<UserResponse>,
    pub(crate) failed: Vec<BulkFailure>,
    pub(crate) results: Vec<BulkResult>,
}

fn default_user_role() -> UserRole {
    UserRole::Student
}
