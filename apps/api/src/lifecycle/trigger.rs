//! Trigger adapters. The engine itself is trigger-agnostic; the login-path
//! middleware and the scheduled task below are thin shells around the same
//! `run_all_checks`, so the two paths can never drift apart.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info};

use crate::errors::AppError;
use crate::lifecycle::{engine, notify, reset, retention};
use crate::state::AppState;

/// Request header that lets lightweight API calls skip the lifecycle hook.
pub const SKIP_HEADER: &str = "x-lifecycle-skip";

/// Paths that must not carry the consistency-check overhead.
const LIGHTWEIGHT_PATHS: [&str; 2] = ["/health", "/api/v1/notifications"];

#[derive(Debug, Default, Serialize)]
pub struct FullCheckReport {
    pub hybrid: engine::HybridCheckReport,
    pub drift: reset::DriftReport,
    pub student_data: retention::StudentDataReport,
    pub events: retention::EventCleanupReport,
    pub notifications: notify::NotificationCleanupReport,
}

impl FullCheckReport {
    /// Every error across the sub-reports, so a background run's partial
    /// failures surface in one log line.
    pub fn errors(&self) -> Vec<&str> {
        self.hybrid
            .errors
            .iter()
            .chain(&self.events.errors)
            .chain(&self.notifications.errors)
            .map(String::as_str)
            .collect()
    }
}

/// Runs the whole consistency suite once: state transitions, drift repair,
/// retention enforcement and notification cleanup.
pub async fn run_all_checks(state: &AppState) -> Result<FullCheckReport, AppError> {
    let today = Utc::now().date_naive();
    let files = state.files.as_ref();

    let hybrid = engine::run_hybrid_check(&state.db, files, today).await?;
    let drift = reset::sync_drift(&state.db).await?;
    let student_data = retention::enforce_student_data_invariant(&state.db).await?;
    let events = retention::enforce_event_approval_invariant(&state.db, files).await?;
    let notifications = notify::enforce_continuous_cleanup(&state.db, files).await?;

    Ok(FullCheckReport {
        hybrid,
        drift,
        student_data,
        events,
        notifications,
    })
}

/// True when a request should not trigger the lifecycle hook.
pub fn should_skip(path: &str, skip_header_present: bool) -> bool {
    skip_header_present || LIGHTWEIGHT_PATHS.iter().any(|p| path.starts_with(p))
}

/// Request-hook adapter: fires the check suite in the background on every
/// non-lightweight request. Fire-and-forget: an engine failure is logged
/// and never blocks the response; consistency simply waits for the next
/// successful pass.
pub async fn lifecycle_hook(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    let skip = req.headers().contains_key(SKIP_HEADER);

    if !should_skip(&path, skip) {
        spawn_checks(state);
    } else {
        debug!("Lifecycle hook skipped for {path}");
    }

    next.run(req).await
}

/// Spawns one background run of the check suite.
pub fn spawn_checks(state: AppState) {
    tokio::spawn(async move {
        match run_all_checks(&state).await {
            Ok(report) => {
                let errors = report.errors();
                if !errors.is_empty() {
                    error!("Lifecycle check finished with errors: {errors:?}");
                }
            }
            Err(e) => error!("Lifecycle check failed: {e}"),
        }
    });
}

/// Cron adapter: runs the same check suite on a fixed period. A period of
/// zero disables it (the login hook still keeps the system self-healing).
pub fn spawn_scheduler(state: AppState, period_secs: u64) {
    if period_secs == 0 {
        info!("Scheduled lifecycle check disabled");
        return;
    }

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(period_secs));
        // The first tick fires immediately, which doubles as a startup check.
        loop {
            ticker.tick().await;
            match run_all_checks(&state).await {
                Ok(report) => info!(
                    "Scheduled lifecycle check: {} terms archived, {} activated, {} errors",
                    report.hybrid.terms_archived.len(),
                    report.hybrid.terms_activated,
                    report.errors().len()
                ),
                Err(e) => error!("Scheduled lifecycle check failed: {e}"),
            }
        }
    });
}
