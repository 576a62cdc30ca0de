//! Shared in-memory port fakes for the pipeline integration tests.
//!
//! The extraction fake deliberately mirrors the database adapter's
//! fetch-then-write shape, with a yield point between the read and the
//! write, so tests can exercise the concurrent lost-update hazard.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures::stream;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

use extractor_core::domain::{Extraction, NewExtraction, StepAdvance, UserProgress};
use extractor_core::ports::{
    ByteStream, ChatCompletionStream, ChatRequest, ExtractionStore, PortError, PortResult,
    ProgressStore,
};
use extractor_core::progress;

pub fn sample_extraction(user_id: Uuid) -> Extraction {
    let now = Utc::now();
    Extraction {
        id: Uuid::new_v4(),
        user_id,
        title: "T".to_string(),
        niche: "N".to_string(),
        target_audience: "A".to_string(),
        transformation: "X".to_string(),
        product_idea: "T — A digital product.".to_string(),
        six_pillars: Some(json!({"timeframe": "60", "expertise": "e", "pillars": []})),
        perc_method: None,
        resources: None,
        sales_page: None,
        current_step: 1,
        is_complete: false,
        created_at: now,
        updated_at: now,
    }
}

//=========================================================================================
// Extraction store fake
//=========================================================================================

#[derive(Default)]
pub struct InMemoryExtractionStore {
    records: Mutex<HashMap<Uuid, Extraction>>,
    /// When set, `apply_step_result` fails after the stream has completed.
    pub fail_applies: AtomicBool,
}

impl InMemoryExtractionStore {
    pub fn insert(&self, extraction: Extraction) {
        self.records
            .lock()
            .unwrap()
            .insert(extraction.id, extraction);
    }

    pub fn snapshot(&self, extraction_id: Uuid) -> Extraction {
        self.records
            .lock()
            .unwrap()
            .get(&extraction_id)
            .cloned()
            .expect("extraction should exist")
    }
}

#[async_trait]
impl ExtractionStore for InMemoryExtractionStore {
    async fn create_extraction(
        &self,
        user_id: Uuid,
        new: NewExtraction,
    ) -> PortResult<Extraction> {
        let now = Utc::now();
        let extraction = Extraction {
            id: Uuid::new_v4(),
            user_id,
            product_idea: new.product_idea(),
            six_pillars: Some(new.seed_six_pillars()),
            title: new.title,
            niche: new.niche,
            target_audience: new.target_audience,
            transformation: new.transformation,
            perc_method: None,
            resources: None,
            sales_page: None,
            current_step: 1,
            is_complete: false,
            created_at: now,
            updated_at: now,
        };
        self.insert(extraction.clone());
        Ok(extraction)
    }

    async fn get_extraction(&self, extraction_id: Uuid, user_id: Uuid) -> PortResult<Extraction> {
        self.records
            .lock()
            .unwrap()
            .get(&extraction_id)
            .filter(|e| e.user_id == user_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound("Extraction not found".to_string()))
    }

    async fn list_extractions(&self, user_id: Uuid) -> PortResult<Vec<Extraction>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn apply_step_result(
        &self,
        extraction_id: Uuid,
        user_id: Uuid,
        step: i32,
        result: Value,
    ) -> PortResult<()> {
        if self.fail_applies.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("write failed".to_string()));
        }
        let mut snapshot = self.get_extraction(extraction_id, user_id).await?;
        // Read-modify-write with a suspension point in between, like the
        // real adapter's fetch-then-update.
        tokio::task::yield_now().await;
        snapshot.apply_step_result(step, result);
        self.insert(snapshot);
        Ok(())
    }

    async fn advance_step(
        &self,
        extraction_id: Uuid,
        user_id: Uuid,
        target_step: i32,
        data: Option<Value>,
    ) -> PortResult<StepAdvance> {
        let mut snapshot = self.get_extraction(extraction_id, user_id).await?;
        snapshot.apply_manual_advance(target_step, data);
        let advance = StepAdvance {
            id: snapshot.id,
            current_step: snapshot.current_step,
            is_complete: snapshot.is_complete,
        };
        self.insert(snapshot);
        Ok(advance)
    }
}

//=========================================================================================
// Progress store fake
//=========================================================================================

#[derive(Default)]
pub struct InMemoryProgressStore {
    records: Mutex<HashMap<Uuid, UserProgress>>,
}

#[async_trait]
impl ProgressStore for InMemoryProgressStore {
    async fn record_advance(&self, user_id: Uuid, target_step: i32) -> PortResult<UserProgress> {
        let existing = self.records.lock().unwrap().get(&user_id).cloned();
        let next = progress::advance(existing, user_id, target_step, Utc::now());
        self.records.lock().unwrap().insert(user_id, next.clone());
        Ok(next)
    }

    async fn get_progress(&self, user_id: Uuid) -> PortResult<UserProgress> {
        self.records
            .lock()
            .unwrap()
            .get(&user_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound("Progress not found".to_string()))
    }
}

//=========================================================================================
// Upstream chat fakes
//=========================================================================================

/// Replays a fixed chunk script; `Err` entries become stream-level failures.
pub struct ScriptedChatStream {
    script: Vec<Result<&'static str, &'static str>>,
    pub calls: AtomicUsize,
    pub requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedChatStream {
    pub fn new(script: Vec<Result<&'static str, &'static str>>) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ChatCompletionStream for ScriptedChatStream {
    async fn open_stream(&self, request: ChatRequest) -> PortResult<ByteStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);
        let chunks: Vec<Result<Bytes, PortError>> = self
            .script
            .iter()
            .map(|entry| match entry {
                Ok(text) => Ok(Bytes::from_static(text.as_bytes())),
                Err(message) => Err(PortError::Unexpected((*message).to_string())),
            })
            .collect();
        Ok(Box::pin(stream::iter(chunks)))
    }
}

/// Fails at establishment, before any stream exists.
pub struct FailingChatStream;

#[async_trait]
impl ChatCompletionStream for FailingChatStream {
    async fn open_stream(&self, _request: ChatRequest) -> PortResult<ByteStream> {
        Err(PortError::Unexpected("LLM API error: 502 Bad Gateway".to_string()))
    }
}
