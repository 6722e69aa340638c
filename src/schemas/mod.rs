use std::collections::HashMap;

use serde::Serialize;

pub(crate) mod auth;
pub(crate) mod dashboard;
pub(crate) mod evaluation;
pub(crate) mod notification;
pub(crate) mod user;

#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) service: String,
    pub(crate) status: String,
    pub(crate) components: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RootResponse {
    pub(crate) message: String,
    pub(crate) version: String,
    pub(crate) api: String,
}
