pub mod error;
pub mod handler;

use axum::{
    Router,
    routing::{get, post},
};
use regid::{LogNotifier, MemoryStore, RegistrationWriter};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub type Writer = RegistrationWriter<MemoryStore>;

/// State shared by every request.
#[derive(Clone, Debug)]
pub struct AppState {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    writer: Writer,
    notifier: LogNotifier,
    event_name: String,
    /// Cancelled on shutdown; in-flight allocations stop at their next round.
    shutdown: CancellationToken,
}

impl AppState {
    pub fn new(writer: Writer, event_name: impl Into<String>, shutdown: CancellationToken) -> Self {
        Self {
            inner: Arc::new(Inner {
                writer,
                notifier: LogNotifier,
                event_name: event_name.into(),
                shutdown,
            }),
        }
    }

    pub fn writer(&self) -> &Writer {
        &self.inner.writer
    }

    pub fn notifier(&self) -> LogNotifier {
        self.inner.notifier
    }

    pub fn event_name(&self) -> &str {
        &self.inner.event_name
    }

    pub fn shutdown(&self) -> &CancellationToken {
        &self.inner.shutdown
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(handler::healthz))
        .route("/registrations", post(handler::register))
        .route("/registrations/{id}", get(handler::get_registration))
        .route("/registrations/{id}/export", post(handler::export))
        .route("/registrations/{id}/badge", get(handler::badge))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
