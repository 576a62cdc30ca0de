//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::state::AppState;
use crate::web::step_task::advance_step_and_track;
use extractor_core::domain::{Extraction, NewExtraction, UserProgress};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        create_extraction_handler,
        list_extractions_handler,
        get_extraction_handler,
        update_extraction_handler,
        progress_handler,
        crate::web::step_task::ai_process_handler,
        crate::web::auth::signup_handler,
        crate::web::auth::login_handler,
        crate::web::auth::logout_handler,
    ),
    components(
        schemas(
            CreateExtractionRequest,
            CreateExtractionResponse,
            ExtractionSummary,
            ExtractionListItem,
            ExtractionDetail,
            UpdateStepRequest,
            UpdateStepResponse,
            StepAdvanceBody,
            ProgressResponse,
            crate::web::step_task::StepRunRequest,
            crate::web::auth::SignupRequest,
            crate::web::auth::LoginRequest,
            crate::web::auth::AuthResponse,
        )
    ),
    tags(
        (name = "Product Extractor API", description = "API endpoints for the guided product-creation pipeline.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// Inputs for a new extraction. Title, niche, target audience and
/// transformation are required; the rest seed the six-pillar slot.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateExtractionRequest {
    pub title: Option<String>,
    pub niche: Option<String>,
    pub target_audience: Option<String>,
    pub transformation: Option<String>,
    pub timeframe: Option<String>,
    pub expertise: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionSummary {
    pub id: Uuid,
    pub title: String,
    pub niche: String,
    pub current_step: i32,
}

#[derive(Serialize, ToSchema)]
pub struct CreateExtractionResponse {
    pub success: bool,
    pub extraction: ExtractionSummary,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionListItem {
    pub id: Uuid,
    pub title: String,
    pub niche: String,
    pub current_step: i32,
    pub is_complete: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionDetail {
    pub id: Uuid,
    pub title: String,
    pub niche: String,
    pub target_audience: String,
    pub transformation: String,
    pub product_idea: String,
    #[schema(value_type = Option<Object>)]
    pub six_pillars: Option<Value>,
    #[schema(value_type = Option<Object>)]
    pub perc_method: Option<Value>,
    #[schema(value_type = Option<Object>)]
    pub resources: Option<Value>,
    #[schema(value_type = Option<Object>)]
    pub sales_page: Option<Value>,
    pub current_step: i32,
    pub is_complete: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Extraction> for ExtractionDetail {
    fn from(extraction: Extraction) -> Self {
        Self {
            id: extraction.id,
            title: extraction.title,
            niche: extraction.niche,
            target_audience: extraction.target_audience,
            transformation: extraction.transformation,
            product_idea: extraction.product_idea,
            six_pillars: extraction.six_pillars,
            perc_method: extraction.perc_method,
            resources: extraction.resources,
            sales_page: extraction.sales_page,
            current_step: extraction.current_step,
            is_complete: extraction.is_complete,
            created_at: extraction.created_at,
            updated_at: extraction.updated_at,
        }
    }
}

/// Body of the explicit step-advance. `data` is the manual-override payload
/// written into the target step's slot when one is defined for it.
#[derive(Deserialize, ToSchema)]
pub struct UpdateStepRequest {
    pub step: Option<i32>,
    #[schema(value_type = Option<Object>)]
    pub data: Option<Value>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StepAdvanceBody {
    pub id: Uuid,
    pub current_step: i32,
    pub is_complete: bool,
}

#[derive(Serialize, ToSchema)]
pub struct UpdateStepResponse {
    pub success: bool,
    pub extraction: StepAdvanceBody,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProgressResponse {
    pub user_id: Uuid,
    pub completed_extractions: i32,
    pub completed_products: i32,
    pub time_in_system: i32,
    #[schema(value_type = Vec<Object>)]
    pub achievements: Value,
    pub current_phase: String,
    pub last_active_at: DateTime<Utc>,
}

impl From<UserProgress> for ProgressResponse {
    fn from(progress: UserProgress) -> Self {
        Self {
            user_id: progress.user_id,
            completed_extractions: progress.completed_extractions,
            completed_products: progress.completed_products,
            time_in_system: progress.time_in_system,
            achievements: progress.achievements,
            current_phase: progress.current_phase,
            last_active_at: progress.last_active_at,
        }
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Create a new extraction session.
#[utoipa::path(
    post,
    path = "/extractions",
    request_body = CreateExtractionRequest,
    responses(
        (status = 201, description = "Extraction created successfully", body = CreateExtractionResponse),
        (status = 400, description = "Missing required fields"),
        (status = 401, description = "Not authenticated"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn create_extraction_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<CreateExtractionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (Some(title), Some(niche), Some(target_audience), Some(transformation)) =
        (req.title, req.niche, req.target_audience, req.transformation)
    else {
        return Err(ApiError::Validation("Missing required fields".to_string()));
    };
    if [&title, &niche, &target_audience, &transformation]
        .iter()
        .any(|field| field.trim().is_empty())
    {
        return Err(ApiError::Validation("Missing required fields".to_string()));
    }

    let extraction = state
        .extractions
        .create_extraction(
            user_id,
            NewExtraction {
                title,
                niche,
                target_audience,
                transformation,
                timeframe: req.timeframe,
                expertise: req.expertise,
            },
        )
        .await?;

    let response = CreateExtractionResponse {
        success: true,
        extraction: ExtractionSummary {
            id: extraction.id,
            title: extraction.title,
            niche: extraction.niche,
            current_step: extraction.current_step,
        },
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// List the caller's extractions, newest first.
#[utoipa::path(
    get,
    path = "/extractions",
    responses(
        (status = 200, description = "The caller's extractions", body = [ExtractionListItem]),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_extractions_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let extractions = state.extractions.list_extractions(user_id).await?;
    let items: Vec<ExtractionListItem> = extractions
        .into_iter()
        .map(|extraction| ExtractionListItem {
            id: extraction.id,
            title: extraction.title,
            niche: extraction.niche,
            current_step: extraction.current_step,
            is_complete: extraction.is_complete,
            created_at: extraction.created_at,
        })
        .collect();
    Ok(Json(items))
}

/// Fetch one extraction with all of its step outputs.
#[utoipa::path(
    get,
    path = "/extractions/{id}",
    params(
        ("id" = Uuid, Path, description = "The extraction to fetch.")
    ),
    responses(
        (status = 200, description = "The extraction", body = ExtractionDetail),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Extraction not found")
    )
)]
pub async fn get_extraction_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(extraction_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let extraction = state
        .extractions
        .get_extraction(extraction_id, user_id)
        .await?;
    Ok(Json(ExtractionDetail::from(extraction)))
}

/// Advance an extraction to a step without running generation.
#[utoipa::path(
    post,
    path = "/extractions/{id}/update",
    request_body = UpdateStepRequest,
    params(
        ("id" = Uuid, Path, description = "The extraction to advance.")
    ),
    responses(
        (status = 200, description = "Cursor moved", body = UpdateStepResponse),
        (status = 400, description = "Missing or out-of-range step"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Extraction not found")
    )
)]
pub async fn update_extraction_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(extraction_id): Path<Uuid>,
    Json(req): Json<UpdateStepRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let step = req
        .step
        .ok_or_else(|| ApiError::Validation("Missing required fields".to_string()))?;

    let advance = advance_step_and_track(
        state.extractions.as_ref(),
        state.progress.as_ref(),
        user_id,
        extraction_id,
        step,
        req.data,
    )
    .await?;

    let response = UpdateStepResponse {
        success: true,
        extraction: StepAdvanceBody {
            id: advance.id,
            current_step: advance.current_step,
            is_complete: advance.is_complete,
        },
    };
    Ok(Json(response))
}

/// Fetch the caller's progress aggregate.
#[utoipa::path(
    get,
    path = "/progress",
    responses(
        (status = 200, description = "The caller's progress", body = ProgressResponse),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "No progress recorded yet")
    )
)]
pub async fn progress_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let progress = state.progress.get_progress(user_id).await?;
    Ok(Json(ProgressResponse::from(progress)))
}
