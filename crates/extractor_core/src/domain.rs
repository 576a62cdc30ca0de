//! crates/extractor_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application, together with
//! the state transitions that move an extraction through the pipeline. The
//! structs are independent of any database or HTTP framework; the step-output
//! slots are JSON documents because their shape is ultimately decided by the
//! language model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::steps::{self, Slot, TERMINAL_STEP};

/// One user's end-to-end product-creation session, tracked by a step
/// cursor 1–8.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub niche: String,
    pub target_audience: String,
    pub transformation: String,
    /// Derived one-line pitch, fixed at creation.
    pub product_idea: String,
    /// Step 1 output: the six-pillar product structure.
    pub six_pillars: Option<Value>,
    /// Step 3 manual-advance output: the PERC methodology object.
    pub perc_method: Option<Value>,
    /// JSON object keyed `step_<N>`, holding the output of every step that
    /// has no dedicated slot.
    pub resources: Option<Value>,
    /// Step 5 output: the sales-page copy.
    pub sales_page: Option<Value>,
    pub current_step: i32,
    pub is_complete: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Extraction {
    /// Applies a pipeline-generated step result: writes the interpreted value
    /// into the slot the step catalog routes it to and moves the cursor to
    /// the step just completed.
    ///
    /// Results for steps without a dedicated slot merge into the `resources`
    /// object under `step_<N>`, preserving the other keys. The whole mapping
    /// is rewritten, so concurrent merges are last-writer-wins.
    pub fn apply_step_result(&mut self, step: i32, result: Value) {
        let slot = steps::definition(step).map_or(Slot::Resources, |d| d.result_slot);
        match slot {
            Slot::SixPillars => self.six_pillars = Some(result),
            Slot::SalesPage => self.sales_page = Some(result),
            Slot::PercMethod => self.perc_method = Some(result),
            Slot::Resources => {
                let mut map = match self.resources.take() {
                    Some(Value::Object(map)) => map,
                    _ => serde_json::Map::new(),
                };
                map.insert(format!("step_{step}"), result);
                self.resources = Some(Value::Object(map));
            }
        }
        self.current_step = step;
    }

    /// Applies an explicit, client-driven advance to `target_step`.
    ///
    /// When `data` is supplied and the catalog defines a manual slot for the
    /// step, the data overwrites that slot wholesale. This is the manual
    /// override path, usable whether or not the generation pipeline ever ran
    /// for the step. Steps without a manual slot ignore `data`.
    pub fn apply_manual_advance(&mut self, target_step: i32, data: Option<Value>) {
        if let Some(value) = data {
            match steps::definition(target_step).and_then(|d| d.manual_slot) {
                Some(Slot::SixPillars) => self.six_pillars = Some(value),
                Some(Slot::PercMethod) => self.perc_method = Some(value),
                Some(Slot::Resources) => self.resources = Some(value),
                Some(Slot::SalesPage) => self.sales_page = Some(value),
                None => {}
            }
        }
        self.current_step = target_step;
        self.is_complete = target_step == TERMINAL_STEP;
    }
}

/// The validated inputs for creating an extraction. Title, niche, audience
/// and transformation are required; timeframe and expertise are optional.
#[derive(Debug, Clone)]
pub struct NewExtraction {
    pub title: String,
    pub niche: String,
    pub target_audience: String,
    pub transformation: String,
    pub timeframe: Option<String>,
    pub expertise: Option<String>,
}

/// The initial value of the six-pillar slot, seeded at creation so step 2
/// always has a pillars array to expand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SixPillarSeed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeframe: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expertise: Option<String>,
    pub pillars: Vec<Value>,
}

impl NewExtraction {
    /// Renders the derived product-idea line stored on the record.
    pub fn product_idea(&self) -> String {
        format!(
            "{} — A digital product that helps {} go from their current challenges to {} in {} minutes.",
            self.title,
            self.target_audience,
            self.transformation,
            self.timeframe.as_deref().unwrap_or_default(),
        )
    }

    /// Builds the seeded six-pillar slot value.
    pub fn seed_six_pillars(&self) -> Value {
        let seed = SixPillarSeed {
            timeframe: self.timeframe.clone(),
            expertise: self.expertise.clone(),
            pillars: Vec::new(),
        };
        serde_json::to_value(seed).unwrap_or_else(|_| Value::Object(serde_json::Map::new()))
    }
}

/// The cursor fields returned from an explicit step advance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepAdvance {
    pub id: Uuid,
    pub current_step: i32,
    pub is_complete: bool,
}

/// One user's lifetime progress counters, independent of any single
/// extraction. Created lazily on the first advance; merged thereafter.
#[derive(Debug, Clone)]
pub struct UserProgress {
    pub user_id: Uuid,
    pub completed_extractions: i32,
    pub completed_products: i32,
    /// Cumulative minutes spent in the system.
    pub time_in_system: i32,
    /// Free-form achievements list (JSON array).
    pub achievements: Value,
    pub current_phase: String,
    pub last_active_at: DateTime<Utc>,
}

// Represents a user - used throughout the app
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}

/// Fixed human-facing message carried by every `processing` event.
pub const PROCESSING_MESSAGE: &str = "Generating content...";

/// One frame of the step-run stream. Never persisted: a stream is zero or
/// more `processing` events followed by exactly one terminal `completed` or
/// `error` event, after which the channel closes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StreamEvent {
    Processing { message: String, chunk: String },
    Completed { result: Value },
    Error { message: String },
}

impl StreamEvent {
    pub fn processing(chunk: impl Into<String>) -> Self {
        Self::Processing {
            message: PROCESSING_MESSAGE.to_string(),
            chunk: chunk.into(),
        }
    }

    pub fn completed(result: Value) -> Self {
        Self::Completed { result }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}
