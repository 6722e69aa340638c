use serde::{Deserialize, Serialize};
use sqlx::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
pub(crate) enum UserRole {
    Student,
    Teacher,
    Admin,
    Institution,
    Dev,
}

impl UserRole {
    pub(crate) const ALL: [UserRole; 5] =
        [Self::Student, Self::Teacher, Self::Admin, Self::Institution, Self::Dev];

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Teacher => "teacher",
            Self::Admin => "admin",
            Self::Institution => "institution",
            Self::Dev => "dev",
        }
    }

    pub(crate) fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.as_str() == value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "review_status", rename_all = "snake_case")]
pub(crate) enum ReviewStatus {
    Pending,
    Approved,
    NeedsRevision,
}

impl ReviewStatus {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::NeedsRevision => "needs_revision",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "evaluation_mode", rename_all = "lowercase")]
pub(crate) enum EvaluationMode {
    Single,
    Bulk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "evaluation_status", rename_all = "snake_case")]
pub(crate) enum EvaluationStatus {
    Draft,
    InReview,
    Finalized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "notification_type", rename_all = "lowercase")]
pub(crate) enum NotificationKind {
    Info,
    Success,
    Warning,
    Error,
    Evaluation,
}
