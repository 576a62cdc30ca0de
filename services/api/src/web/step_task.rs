//! services/api/src/web/step_task.rs
//!
//! Per-request orchestration of one generation step: load the owned
//! extraction, render its prompt, open the upstream completion stream, relay
//! it to the client while accumulating the transcript, then interpret and
//! persist the result. Also hosts the explicit step-advance used when the
//! client accepts a result and moves on without re-running generation.

use axum::{
    body::Body,
    extract::{Extension, Path, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::protocol::frame;
use crate::web::state::AppState;
use extractor_core::domain::{StepAdvance, StreamEvent};
use extractor_core::interpret::{interpret, ResultKind};
use extractor_core::ports::{ChatCompletionStream, ChatRequest, ExtractionStore, ProgressStore};
use extractor_core::prompt::build_prompt;
use extractor_core::relay::relay;
use extractor_core::steps::TERMINAL_STEP;

/// Terminal error message shown to the client for any mid-stream failure.
const PROCESSING_FAILED: &str = "Processing failed";

/// Buffered events between the relay task and the response body writer.
const EVENT_CHANNEL_CAPACITY: usize = 32;

#[derive(Deserialize, ToSchema)]
pub struct StepRunRequest {
    pub step: Option<i32>,
}

/// Runs the generation pipeline for one step and returns the event channel
/// feeding the client stream.
///
/// Ownership is checked before anything else; the upstream call is opened
/// before the channel exists, so an establishment failure surfaces as a
/// request-level error with no stream started. Everything after that (relay,
/// interpretation, persistence) funnels into the channel's single terminal
/// event. Dropping the receiver (client disconnect) makes the relay's next
/// send fail, which abandons the upstream read.
pub async fn run_step_pipeline(
    extractions: Arc<dyn ExtractionStore>,
    chat: Arc<dyn ChatCompletionStream>,
    user_id: Uuid,
    extraction_id: Uuid,
    step: i32,
) -> Result<mpsc::Receiver<StreamEvent>, ApiError> {
    if !(1..=TERMINAL_STEP).contains(&step) {
        return Err(ApiError::Validation(
            "step must be between 1 and 8".to_string(),
        ));
    }

    let extraction = extractions.get_extraction(extraction_id, user_id).await?;
    let built = build_prompt(step, &extraction);
    let expects_json = built.expects_json;

    let upstream = chat
        .open_stream(ChatRequest {
            prompt: built.text,
            expects_json,
        })
        .await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;

    let (events, receiver) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    tokio::spawn(async move {
        match relay(upstream, &events).await {
            Ok(transcript) => {
                let interpreted = interpret(expects_json, &transcript);
                if interpreted.kind == ResultKind::FallbackWrapped {
                    warn!(
                        "Step {} expected structured output but the response was not valid JSON; storing raw content",
                        step
                    );
                }
                // Persist before the terminal event so a client that sees
                // `completed` can rely on the slot being written.
                match extractions
                    .apply_step_result(extraction_id, user_id, step, interpreted.value.clone())
                    .await
                {
                    Ok(()) => {
                        let _ = events.send(StreamEvent::completed(interpreted.value)).await;
                        info!("Step {} completed for extraction {}", step, extraction_id);
                    }
                    Err(e) => {
                        error!("Failed to persist step {} result: {:?}", step, e);
                        let _ = events.send(StreamEvent::error(PROCESSING_FAILED)).await;
                    }
                }
            }
            Err(e) => {
                error!("Stream relay failed for extraction {}: {:?}", extraction_id, e);
                let _ = events.send(StreamEvent::error(PROCESSING_FAILED)).await;
            }
        }
        // The sender drops here, closing the channel after the terminal event.
    });

    Ok(receiver)
}

/// The explicit step-jump: moves the cursor (optionally writing supplied data
/// into the target step's slot) and updates the user's progress aggregate.
pub async fn advance_step_and_track(
    extractions: &dyn ExtractionStore,
    progress: &dyn ProgressStore,
    user_id: Uuid,
    extraction_id: Uuid,
    target_step: i32,
    data: Option<Value>,
) -> Result<StepAdvance, ApiError> {
    if !(1..=TERMINAL_STEP).contains(&target_step) {
        return Err(ApiError::Validation(
            "step must be between 1 and 8".to_string(),
        ));
    }

    let advance = extractions
        .advance_step(extraction_id, user_id, target_step, data)
        .await?;
    progress.record_advance(user_id, target_step).await?;
    Ok(advance)
}

/// Run one generation step, streaming progress to the client.
///
/// The response body carries `data: <json>` records where each payload is a
/// `processing`, `completed` or `error` event, the same framing the
/// upstream relay consumes.
#[utoipa::path(
    post,
    path = "/extractions/{id}/ai-process",
    request_body = StepRunRequest,
    params(
        ("id" = Uuid, Path, description = "The extraction to run the step for.")
    ),
    responses(
        (status = 200, description = "Event stream: zero or more processing events, then one terminal event", body = String, content_type = "text/plain"),
        (status = 400, description = "Missing or out-of-range step"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Extraction not found"),
        (status = 500, description = "Upstream call could not be established")
    )
)]
pub async fn ai_process_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(extraction_id): Path<Uuid>,
    Json(req): Json<StepRunRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let step = req
        .step
        .ok_or_else(|| ApiError::Validation("Missing required fields".to_string()))?;

    let mut events = run_step_pipeline(
        state.extractions.clone(),
        state.chat.clone(),
        user_id,
        extraction_id,
        step,
    )
    .await?;

    let frames = async_stream::stream! {
        while let Some(event) = events.recv().await {
            yield Ok::<_, Infallible>(frame(&event));
        }
    };

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Body::from_stream(frames),
    ))
}
