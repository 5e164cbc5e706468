use actix_web::HttpResponse;
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, TextEncoder};

static STREAMS_CREATED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "live_session_streams_created_total",
        "Streams created by the session orchestrator",
    )
    .expect("failed to create live_session_streams_created_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register live_session_streams_created_total");
    counter
});

static STREAMS_STARTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "live_session_streams_started_total",
        "Streams transitioned to live",
    )
    .expect("failed to create live_session_streams_started_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register live_session_streams_started_total");
    counter
});

static STREAMS_ENDED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "live_session_streams_ended_total",
        "Streams transitioned to ended",
    )
    .expect("failed to create live_session_streams_ended_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register live_session_streams_ended_total");
    counter
});

static PARTICIPANTS_JOINED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "live_session_participants_joined_total",
        "Successful stream joins",
    )
    .expect("failed to create live_session_participants_joined_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register live_session_participants_joined_total");
    counter
});

static LIMIT_REJECTED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "live_session_limit_rejected_total",
            "Operations rejected by a concurrency ceiling",
        ),
        &["limit"],
    )
    .expect("failed to create live_session_limit_rejected_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register live_session_limit_rejected_total");
    counter
});

static RECORDING_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "live_session_recording_failures_total",
        "Best-effort recording operations that failed",
    )
    .expect("failed to create live_session_recording_failures_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register live_session_recording_failures_total");
    counter
});

pub fn stream_created() {
    STREAMS_CREATED_TOTAL.inc();
}

pub fn stream_started() {
    STREAMS_STARTED_TOTAL.inc();
}

pub fn stream_ended() {
    STREAMS_ENDED_TOTAL.inc();
}

pub fn participant_joined() {
    PARTICIPANTS_JOINED_TOTAL.inc();
}

pub fn limit_rejected(limit: &str) {
    LIMIT_REJECTED_TOTAL.with_label_values(&[limit]).inc();
}

pub fn recording_failure() {
    RECORDING_FAILURES_TOTAL.inc();
}

pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
