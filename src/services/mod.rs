pub(crate) mod access_policy;
pub(crate) mod ai_grading;
pub(crate) mod answer_sheets;
pub(crate) mod evaluation_review;
pub(crate) mod grading;
pub(crate) mod mock_grading;
pub(crate) mod notification_hub;
pub(crate) mod notifications;
pub(crate) mod user_admin;
