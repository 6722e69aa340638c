pub(crate) mod auth_accounts;
pub(crate) mod evaluations;
pub(crate) mod health;
pub(crate) mod notifications;
pub(crate) mod profiles;
