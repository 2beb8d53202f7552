//! HTTP surface over the lifecycle engine.

use std::sync::Arc;

use axum::middleware::from_fn;
use axum::routing::{delete, get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::ExitTimePolicy;
use crate::engine::Engine;
use crate::persistence::db::Database;
use crate::persistence::directory_repo::DirectoryRepo;
use crate::{AppError, Result};

mod active_groups;
mod analytics;
pub mod auth;
mod checkouts;
mod combined_groups;
mod display;
mod error;
mod response;
mod supervisors;
mod visits;

/// State shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Lifecycle engine.
    pub engine: Arc<Engine>,
    /// Directory lookups for display fields.
    pub directory: DirectoryRepo,
}

impl AppState {
    /// Build state over `db`.
    #[must_use]
    pub fn new(db: &Arc<Database>, exit_time_policy: ExitTimePolicy) -> Self {
        Self {
            engine: Arc::new(Engine::new(db, exit_time_policy)),
            directory: DirectoryRepo::new(Arc::clone(db)),
        }
    }
}

/// Full route table.
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/active/groups", get(active_groups::list).post(active_groups::create))
        .route(
            "/active/groups/{id}",
            get(active_groups::get)
                .put(active_groups::update)
                .delete(active_groups::remove),
        )
        .route("/active/groups/{id}/end", post(active_groups::end))
        .route("/active/groups/{id}/claim", post(active_groups::claim))
        .route("/active/groups/{id}/visits", get(active_groups::visits))
        .route("/active/groups/{id}/supervisors", get(active_groups::supervisors))
        .route("/active/unclaimed", get(active_groups::unclaimed))
        .route("/active/visits", get(visits::list).post(visits::create))
        .route(
            "/active/visits/{id}",
            get(visits::get).put(visits::update).delete(visits::remove),
        )
        .route("/active/visits/{id}/end", post(visits::end))
        .route("/active/visits/student/{student_id}", get(visits::for_student))
        .route("/active/visits/student/{student_id}/current", get(visits::current))
        .route("/active/supervisors", get(supervisors::list).post(supervisors::create))
        .route(
            "/active/supervisors/{id}",
            get(supervisors::get)
                .put(supervisors::update)
                .delete(supervisors::remove),
        )
        .route("/active/supervisors/{id}/end", post(supervisors::end))
        .route("/active/supervisors/staff/{staff_id}", get(supervisors::for_staff))
        .route("/active/supervisors/staff/{staff_id}/active", get(supervisors::active_for_staff))
        .route(
            "/active/combined-groups",
            get(combined_groups::list).post(combined_groups::create),
        )
        .route("/active/combined-groups/active", get(combined_groups::list_active))
        .route(
            "/active/combined-groups/{id}",
            get(combined_groups::get)
                .put(combined_groups::update)
                .delete(combined_groups::remove),
        )
        .route("/active/combined-groups/{id}/end", post(combined_groups::end))
        .route("/active/combined-groups/{id}/mappings", get(combined_groups::mappings))
        .route("/active/combined-groups/{id}/groups", post(combined_groups::add_group))
        .route(
            "/active/combined-groups/{id}/groups/{group_id}",
            delete(combined_groups::remove_group),
        )
        .route("/active/analytics/counts", get(analytics::counts))
        .route("/active/analytics/dashboard", get(analytics::dashboard))
        .route("/active/analytics/rooms/{room_id}/utilization", get(analytics::room_utilization))
        .route(
            "/active/analytics/students/{student_id}/attendance",
            get(analytics::student_attendance),
        )
        .route("/checkouts", post(checkouts::create))
        .route("/checkouts/process-due", post(checkouts::process_due))
        .route("/checkouts/{id}", get(checkouts::get))
        .route("/checkouts/{id}/cancel", post(checkouts::cancel))
        .route("/checkouts/student/{student_id}", get(checkouts::for_student))
        .route("/checkouts/student/{student_id}/pending", get(checkouts::pending_for_student))
        .route_layer(from_fn(auth::require_caller))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

/// Serve `router` on `listener` until `cancel` fires.
///
/// # Errors
///
/// Returns `AppError::Io` if the server fails.
pub async fn serve(listener: TcpListener, state: AppState, cancel: CancellationToken) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "http server listening");
    }

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|err| AppError::Io(format!("http server failed: {err}")))
}
