pub(crate) mod admin_users;
pub(crate) mod auth;
pub(crate) mod dashboards;
pub(crate) mod errors;
pub(crate) mod evaluations;
pub(crate) mod guards;
pub(crate) mod handlers;
pub(crate) mod notifications;
pub(crate) mod pagination;
pub(crate) mod router;
pub(crate) mod session_cookie;
pub(crate) mod validation;
