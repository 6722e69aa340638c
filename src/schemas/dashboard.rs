use std::collections::BTreeMap;

use serde::Serialize;

use crate::db::types::{EvaluationStatus, UserRole};
use crate::schemas::notification::NotificationResponse;
use crate::schemas::user::UserResponse;

#[derive(Debug, Default, Clone, Serialize, PartialEq)]
pub(crate) struct StatusCounts {
    pub(crate) draft: i64,
    pub(crate) in_review: i64,
    pub(crate) finalized: i64,
}

impl StatusCounts {
    pub(crate) fn from_rows(rows: &[(EvaluationStatus, i64)]) -> Self {
        rows.iter().fold(Self::default(), |mut counts, (status, count)| {
            match status {
                EvaluationStatus::Draft => counts.draft += count,
                EvaluationStatus::InReview => counts.in_review += count,
                EvaluationStatus::Finalized => counts.finalized += count,
            }
            counts
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub(crate) enum DashboardData {
    Student {
        unread_notifications: i64,
        recent_notifications: Vec<NotificationResponse>,
    },
    Teacher {
        evaluations: StatusCounts,
        pending_reviews: i64,
    },
    Admin {
        users_by_role: BTreeMap<String, i64>,
        total_users: i64,
    },
    Institution {
        users_by_role: BTreeMap<String, i64>,
        evaluations: StatusCounts,
        finalized_evaluations: i64,
    },
    Dev {
        dashboards: Vec<String>,
    },
}

impl DashboardData {
    /// Zeroed view returned when the backing queries fail.
    pub(crate) fn empty(role: UserRole) -> Self {
        match role {
            UserRole::Student => {
                Self::Student { unread_notifications: 0, recent_notifications: Vec::new() }
            }
            UserRole::Teacher => {
                Self::Teacher { evaluations: StatusCounts::default(), pending_reviews: 0 }
            }
            UserRole::Admin => Self::Admin { users_by_role: BTreeMap::new(), total_users: 0 },
            UserRole::Institution => Self::Institution {
                users_by_role: BTreeMap::new(),
                evaluations: StatusCounts::default(),
                finalized_evaluations: 0,
            },
            UserRole::Dev => Self::Dev { dashboards: Vec::new() },
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct DashboardResponse {
    pub(crate) dashboard: UserRole,
    pub(crate) user: UserResponse,
    pub(crate) degraded: bool,
    pub(crate) data: DashboardData,
}
