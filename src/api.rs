//! HTTP interface: digest read endpoints, authenticated admin triggers,
//! and the rate-limited assistant.

use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::TypedHeader;
use axum_extra::headers::{authorization::Bearer, Authorization};
use ring::constant_time;
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::assistant::{self, RateLimiter};
use crate::enrichment;
use crate::pipeline::{self, today, PipelineContext};

pub struct AppState {
    pub ctx: Arc<PipelineContext>,
    pub admin_token: String,
    pub rate_limiter: RateLimiter,
}

#[derive(Deserialize)]
struct AssistantRequest {
    question: String,
    fingerprint: String,
}

pub async fn serve(ctx: Arc<PipelineContext>, admin_token: String, port: u16) -> Result<()> {
    let state = Arc::new(AppState {
        ctx,
        admin_token,
        rate_limiter: RateLimiter::new(),
    });

    let app = Router::new()
        .route("/digests", get(list_digests))
        .route("/digests/{date}", get(digest_by_date))
        .route("/admin/generate", post(trigger_generate))
        .route("/admin/rebuild", post(trigger_rebuild))
        .route("/admin/summarize", post(trigger_summarize))
        .route("/admin/enrich-comments", post(trigger_enrich))
        .route("/assistant", post(ask_assistant))
        .with_state(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;
    info!("API server listening on http://{}", addr);

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

/// Constant-time comparison against the configured admin secret. Write
/// endpoints return 401 before any side effect on mismatch.
fn authorized(state: &AppState, auth: &Option<TypedHeader<Authorization<Bearer>>>) -> bool {
    let Some(TypedHeader(Authorization(bearer))) = auth else {
        return false;
    };
    constant_time::verify_slices_are_equal(
        bearer.token().as_bytes(),
        state.admin_token.as_bytes(),
    )
    .is_ok()
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"status": "error", "error": "unauthorized"})),
    )
        .into_response()
}

fn pipeline_error(err: anyhow::Error) -> Response {
    error!("Pipeline trigger failed: {:#}", err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"status": "error", "error": err.to_string()})),
    )
        .into_response()
}

async fn list_digests(State(state): State<Arc<AppState>>) -> Response {
    match state.ctx.db.list_digests().await {
        Ok(digests) => Json(digests).into_response(),
        Err(err) => pipeline_error(err.into()),
    }
}

async fn digest_by_date(
    State(state): State<Arc<AppState>>,
    Path(date): Path<String>,
) -> Response {
    let digest = match state.ctx.db.digest_for_date(&date).await {
        Ok(Some(digest)) => digest,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({"status": "error", "error": format!("no digest for {}", date)})),
            )
                .into_response();
        }
        Err(err) => return pipeline_error(err.into()),
    };

    match state.ctx.db.digest_items(digest.id).await {
        Ok(items) => Json(json!({"digest": digest, "items": items})).into_response(),
        Err(err) => pipeline_error(err.into()),
    }
}

async fn trigger_generate(
    State(state): State<Arc<AppState>>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
) -> Response {
    if !authorized(&state, &auth) {
        return unauthorized();
    }
    match pipeline::generate_digest(&state.ctx).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(err) => pipeline_error(err),
    }
}

async fn trigger_rebuild(
    State(state): State<Arc<AppState>>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
) -> Response {
    if !authorized(&state, &auth) {
        return unauthorized();
    }
    match pipeline::rebuild_digest(&state.ctx).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(err) => pipeline_error(err),
    }
}

async fn trigger_summarize(
    State(state): State<Arc<AppState>>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
) -> Response {
    if !authorized(&state, &auth) {
        return unauthorized();
    }
    match pipeline::summarize_incremental(&state.ctx).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(err) => pipeline_error(err),
    }
}

async fn trigger_enrich(
    State(state): State<Arc<AppState>>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
) -> Response {
    if !authorized(&state, &auth) {
        return unauthorized();
    }
    let ctx = &state.ctx;
    match enrichment::enrich_comments(&ctx.db, &ctx.http, &ctx.providers, &ctx.registry, &today())
        .await
    {
        Ok(report) => Json(json!({"status": "ok", "report": report})).into_response(),
        Err(err) => pipeline_error(err),
    }
}

async fn ask_assistant(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AssistantRequest>,
) -> Response {
    if request.question.trim().is_empty() || request.fingerprint.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"status": "error", "error": "question and fingerprint are required"})),
        )
            .into_response();
    }

    // Enforced before any AI call.
    if !state
        .rate_limiter
        .check_and_record(&request.fingerprint, assistant::now_millis())
    {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({"status": "error", "error": "rate limit exceeded, try again tomorrow"})),
        )
            .into_response();
    }

    match assistant::answer_question(&state.ctx, &request.question).await {
        Ok(answer) => Json(json!({"status": "ok", "answer": answer})).into_response(),
        Err(err) => pipeline_error(err),
    }
}
