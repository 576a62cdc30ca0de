//! crates/extractor_core/src/steps.rs
//!
//! The static catalog of the eight pipeline stages. This table is the single
//! authority for everything that varies by step number: which prompt template
//! is rendered, whether the model is asked for structured JSON, and which
//! slot of the extraction record the output lands in. The prompt builder,
//! the result interpreter and the state transitions all consult it instead
//! of branching on step numbers themselves.

/// The last stage of the pipeline. Reaching it marks the extraction complete.
pub const TERMINAL_STEP: i32 = 8;

/// A persisted slot of the extraction record that a step can write to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    SixPillars,
    PercMethod,
    /// The `resources` JSON object; pipeline results merge under `step_<N>`,
    /// manual advances overwrite the whole object.
    Resources,
    SalesPage,
}

/// Which prompt template a step renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    ProductExtraction,
    PillarExpansion,
    SalesPageGeneration,
    /// Generic templated continuation referencing the step number.
    Continuation,
}

/// One stage of the extraction pipeline.
#[derive(Debug, Clone, Copy)]
pub struct StepDefinition {
    pub number: i32,
    pub title: &'static str,
    pub description: &'static str,
    /// Display-only duration estimate; never used for control flow.
    pub estimated_minutes: u32,
    /// Whether the upstream call requests (and the interpreter attempts)
    /// structured JSON output.
    pub expects_json: bool,
    pub prompt: PromptKind,
    /// Where a pipeline-generated result is persisted.
    pub result_slot: Slot,
    /// Where an explicit step-advance may write client-supplied data, if
    /// anywhere. This is the manual-override path, independent of whether
    /// the generation pipeline ever ran for the step.
    pub manual_slot: Option<Slot>,
}

pub const STEP_DEFINITIONS: [StepDefinition; 8] = [
    StepDefinition {
        number: 1,
        title: "Product Extraction",
        description: "Generate your 6-pillar product structure using AI",
        estimated_minutes: 15,
        expects_json: true,
        prompt: PromptKind::ProductExtraction,
        result_slot: Slot::SixPillars,
        manual_slot: Some(Slot::SixPillars),
    },
    StepDefinition {
        number: 2,
        title: "Content Expansion",
        description: "Develop detailed content for each pillar",
        estimated_minutes: 10,
        expects_json: false,
        prompt: PromptKind::PillarExpansion,
        result_slot: Slot::Resources,
        manual_slot: None,
    },
    StepDefinition {
        number: 3,
        title: "PERC Method Integration",
        description: "Apply the Plan, Eliminate, Replace, Create framework",
        estimated_minutes: 8,
        expects_json: false,
        prompt: PromptKind::Continuation,
        result_slot: Slot::Resources,
        manual_slot: Some(Slot::PercMethod),
    },
    StepDefinition {
        number: 4,
        title: "Resource Creation",
        description: "Generate templates, checklists, and supporting materials",
        estimated_minutes: 12,
        expects_json: false,
        prompt: PromptKind::Continuation,
        result_slot: Slot::Resources,
        manual_slot: Some(Slot::Resources),
    },
    StepDefinition {
        number: 5,
        title: "Sales Page Generation",
        description: "Create converting sales copy and marketing materials",
        estimated_minutes: 10,
        expects_json: true,
        prompt: PromptKind::SalesPageGeneration,
        result_slot: Slot::SalesPage,
        manual_slot: Some(Slot::SalesPage),
    },
    StepDefinition {
        number: 6,
        title: "Bonus Materials",
        description: "Add value-boosting complementary bonuses",
        estimated_minutes: 8,
        expects_json: false,
        prompt: PromptKind::Continuation,
        result_slot: Slot::Resources,
        manual_slot: None,
    },
    StepDefinition {
        number: 7,
        title: "Pricing Strategy",
        description: "Optimize pricing and upsell structure",
        estimated_minutes: 5,
        expects_json: false,
        prompt: PromptKind::Continuation,
        result_slot: Slot::Resources,
        manual_slot: None,
    },
    StepDefinition {
        number: 8,
        title: "Final Package",
        description: "Complete product ready for launch",
        estimated_minutes: 2,
        expects_json: false,
        prompt: PromptKind::Continuation,
        result_slot: Slot::Resources,
        manual_slot: None,
    },
];

/// Looks up the definition for a step number, or `None` outside 1..=8.
pub fn definition(step: i32) -> Option<&'static StepDefinition> {
    STEP_DEFINITIONS.iter().find(|d| d.number == step)
}
