use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tokio::time::Instant;

use crate::state::AppState;

/// Process-wide request counters, exposed at `/debug/metrics`.
#[derive(Default)]
pub struct Metrics {
    requests_received: AtomicU64,
    responses_sent: AtomicU64,
    processing_time_micros: AtomicU64,
    responses_by_status: Mutex<HashMap<u16, u64>>,
}

impl Metrics {
    pub fn record(&self, status: u16, elapsed_micros: u64) {
        self.responses_sent.fetch_add(1, Ordering::Relaxed);
        self.processing_time_micros
            .fetch_add(elapsed_micros, Ordering::Relaxed);
        let mut by_status = self
            .responses_by_status
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        *by_status.entry(status).or_insert(0) += 1;
    }

    pub fn snapshot(&self) -> serde_json::Value {
        let by_status: HashMap<String, u64> = self
            .responses_by_status
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(status, count)| (status.to_string(), *count))
            .collect();

        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "total_requests_received": self.requests_received.load(Ordering::Relaxed),
            "total_responses_sent": self.responses_sent.load(Ordering::Relaxed),
            "total_processing_time_us": self.processing_time_micros.load(Ordering::Relaxed),
            "total_responses_sent_by_status": by_status,
        })
    }
}

pub async fn collect_metrics(State(state): State<AppState>, request: Request, next: Next) -> Response {
    state
        .metrics
        .requests_received
        .fetch_add(1, Ordering::Relaxed);

    let started = Instant::now();
    let response = next.run(request).await;

    let elapsed = started.elapsed().as_micros() as u64;
    state.metrics.record(response.status().as_u16(), elapsed);
    response
}

pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.snapshot())
}
