use std::sync::Arc;

use sqlx::PgPool;

use crate::core::{config::Settings, redis::RedisHandle};
use crate::services::grading::Grader;
use crate::services::notification_hub::NotificationHub;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    db: PgPool,
    redis: RedisHandle,
    grader: Arc<dyn Grader>,
    notifications: NotificationHub,
}

impl AppState {
    pub(crate) fn new(
        settings: Settings,
        db: PgPool,
        redis: RedisHandle,
        grader: Arc<dyn Grader>,
        notifications: NotificationHub,
    ) -> Self {
        Self { inner: Arc::new(InnerState { settings, db, redis, grader, notifications }) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn db(&self) -> &PgPool {
        &self.inner.db
    }

    pub(crate) fn redis(&self) -> &RedisHandle {
        &self.inner.redis
    }

    pub(crate) fn grader(&self) -> &dyn Grader {
        self.inner.grader.as_ref()
    }

    pub(crate) fn notifications(&self) -> &NotificationHub {
        &self.inner.notifications
    }
}
