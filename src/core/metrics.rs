use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled || PROM_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROM_HANDLE.set(handle);

    metrics::describe_counter!(
        "evaluation_transitions_total",
        "Teacher review transitions applied to evaluation records"
    );
    metrics::describe_counter!("evaluations_finalized_total", "Evaluations locked by finalize");
    metrics::describe_counter!("notifications_sent_total", "Notifications written for users");
    metrics::describe_counter!(
        "admin_user_actions_total",
        "Admin user-management actions by outcome"
    );
    Ok(())
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}

pub(crate) fn record_transition(action: &'static str, count: u64) {
    metrics::counter!("evaluation_transitions_total", "action" => action).increment(count);
}

pub(crate) fn record_finalized() {
    metrics::counter!("evaluations_finalized_total").increment(1);
}

pub(crate) fn record_notifications(count: u64) {
    metrics::counter!("notifications_sent_total").increment(count);
}

pub(crate) fn record_admin_action(action: &'static str, outcome: &'static str) {
    metrics::counter!("admin_user_actions_total", "action" => action, "outcome" => outcome)
        .increment(1);
}
