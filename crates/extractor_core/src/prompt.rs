//! crates/extractor_core/src/prompt.rs
//!
//! Renders the per-step prompt sent to the language model. Pure string
//! templating over the extraction snapshot with no network or persistence side
//! effects, so the output is deterministic for a given input.

const PRODUCT_EXTRACTION: &str = r#"
You are an expert product creation coach. Help create a complete digital product using the 6-Pillar Framework.

Based on this product idea: {productIdea}
Target Audience: {targetAudience}
Transformation Promise: {transformation}

Create a comprehensive product structure with:

1. **Product Overview**
   - Clear title and tagline
   - Core promise and transformation
   - Target completion time (should be 15-60 minutes)

2. **6-Pillar Structure** - Each pillar must include:
   - **Pillar Title & Focus**: What it covers and why crucial
   - **Quick Win Action**: Immediate 2-5 minute task
   - **Why It Works**: Science/psychology backing
   - **Step-by-Step Plan**: Exact implementation (3-5 steps)
   - **Plug-and-Play Resources**: Templates or tools needed
   - **Real-Life Example**: Relatable story or case study

3. **PERC Method Integration** for each pillar:
   - **Plan**: Clear path forward
   - **Eliminate**: What to avoid or stop doing
   - **Replace**: Better alternatives or upgrades
   - **Create**: New systems or habits to build

4. **Supporting Materials**
   - Checklists and templates needed
   - Tracking tools or worksheets
   - Quick reference guides

Respond in JSON format with structured data for easy implementation.
"#;

const PILLAR_EXPANSION: &str = r#"
You are an expert content developer. Take this pillar outline and expand it into complete, actionable content:

Pillar: {pillarTitle}
Current Content: {currentContent}
Target Audience: {targetAudience}

Expand this pillar to include:

1. **Detailed Content** (200-400 words)
   - Clear explanation of the concept
   - Why it's crucial for transformation
   - Common mistakes to avoid

2. **Scientific Backing**
   - Research or psychological principles
   - Expert opinions or studies
   - Credible statistics if relevant

3. **Step-by-Step Implementation** (5-7 clear steps)
   - Specific, actionable instructions
   - Time estimates for each step
   - Tools or resources needed

4. **Templates and Resources**
   - Checklists or worksheets
   - Scripts or copy-paste materials
   - Tracking or measurement tools

5. **Real-World Examples**
   - 2-3 concrete scenarios
   - Before/after comparisons
   - Success stories or case studies

Format as detailed, ready-to-use content that delivers immediate value.
"#;

const SALES_PAGE_GENERATION: &str = r#"
You are an expert copywriter specializing in high-converting sales pages for digital products.

Create a complete sales page for:
Product: {productTitle}
Price: {price}
Target Audience: {targetAudience}
Transformation: {transformation}
6-Pillar Structure: {pillars}

Generate the following sections:

1. **Headline & Subheadline**
   - Attention-grabbing promise + timeframe
   - Address biggest objection upfront

2. **Problem Agitation** (150-200 words)
   - Identify specific pain points
   - Amplify frustration and urgency
   - Connect to target audience's daily struggle

3. **Solution Introduction** (100-150 words)
   - Position your product as the answer
   - Explain the unique mechanism
   - Promise specific outcome

4. **What You Get** (detailed breakdown)
   - All 6 pillars with benefits
   - Supporting materials and bonuses
   - Total value calculation

5. **Social Proof Section**
   - Success story framework
   - Testimonial templates
   - Results and outcomes

6. **Pricing & Guarantee**
   - Value stack presentation
   - Risk-free guarantee language
   - Urgency and scarcity elements

7. **FAQ Section** (8-10 common objections)
   - Address typical concerns
   - Overcome resistance points
   - Reinforce value and guarantee

8. **Final Call-to-Action**
   - Clear next steps
   - Urgency reinforcement
   - Risk reversal statement

Format as complete, copy-paste ready sales page content.
"#;

use crate::domain::Extraction;
use crate::steps::{self, PromptKind};
use serde_json::Value;

/// The fixed launch price substituted into the sales-page template.
pub const PRODUCT_PRICE: &str = "$37";

/// The pillar-expansion step always expands the full set at once.
const ALL_PILLARS: &str = "All Pillars";

/// A rendered prompt plus the structured-output flag the upstream request
/// and the interpreter both honor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltPrompt {
    pub text: String,
    pub expects_json: bool,
}

/// Renders the prompt for `step` from the current extraction snapshot.
/// Steps outside the catalog fall back to the generic continuation prompt.
pub fn build_prompt(step: i32, extraction: &Extraction) -> BuiltPrompt {
    let definition = steps::definition(step);
    let kind = definition.map_or(PromptKind::Continuation, |d| d.prompt);
    let expects_json = definition.is_some_and(|d| d.expects_json);

    let text = match kind {
        PromptKind::ProductExtraction => PRODUCT_EXTRACTION
            .replace("{productIdea}", &extraction.product_idea)
            .replace("{targetAudience}", &extraction.target_audience)
            .replace("{transformation}", &extraction.transformation),
        PromptKind::PillarExpansion => PILLAR_EXPANSION
            .replace("{pillarTitle}", ALL_PILLARS)
            .replace("{currentContent}", &pillars_json(extraction))
            .replace("{targetAudience}", &extraction.target_audience),
        PromptKind::SalesPageGeneration => SALES_PAGE_GENERATION
            .replace("{productTitle}", &extraction.title)
            .replace("{price}", PRODUCT_PRICE)
            .replace("{targetAudience}", &extraction.target_audience)
            .replace("{transformation}", &extraction.transformation)
            .replace("{pillars}", &pillars_json(extraction)),
        PromptKind::Continuation => format!(
            "Continue processing step {step} for the product \"{}\".\n\
             Target audience: {}\n\
             Transformation: {}\n\n\
             Generate appropriate content for this step with detailed, actionable information.",
            extraction.title, extraction.target_audience, extraction.transformation,
        ),
    };

    BuiltPrompt { text, expects_json }
}

/// Serializes the current pillars array, or `[]` when the six-pillar slot is
/// missing or does not carry one.
fn pillars_json(extraction: &Extraction) -> String {
    extraction
        .six_pillars
        .as_ref()
        .and_then(|v| v.get("pillars"))
        .cloned()
        .unwrap_or_else(|| Value::Array(Vec::new()))
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn extraction() -> Extraction {
        Extraction {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            title: "Morning Momentum".to_string(),
            niche: "productivity".to_string(),
            target_audience: "busy parents".to_string(),
            transformation: "calm mornings".to_string(),
            product_idea: "Morning Momentum — a digital product.".to_string(),
            six_pillars: Some(json!({"timeframe": "60", "pillars": [{"title": "Wake"}]})),
            perc_method: None,
            resources: None,
            sales_page: None,
            current_step: 1,
            is_complete: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn building_is_deterministic() {
        let extraction = extraction();
        assert_eq!(build_prompt(1, &extraction), build_prompt(1, &extraction));
    }

    #[test]
    fn step_one_substitutes_the_product_idea_and_expects_json() {
        let built = build_prompt(1, &extraction());
        assert!(built.expects_json);
        assert!(built.text.contains("Morning Momentum — a digital product."));
        assert!(built.text.contains("busy parents"));
        assert!(!built.text.contains("{productIdea}"));
        assert!(!built.text.contains("{targetAudience}"));
    }

    #[test]
    fn step_two_serializes_the_current_pillars() {
        let built = build_prompt(2, &extraction());
        assert!(!built.expects_json);
        assert!(built.text.contains("All Pillars"));
        assert!(built.text.contains(r#"[{"title":"Wake"}]"#));
    }

    #[test]
    fn step_two_falls_back_to_an_empty_pillars_array() {
        let mut extraction = extraction();
        extraction.six_pillars = None;
        let built = build_prompt(2, &extraction);
        assert!(built.text.contains("Current Content: []"));
    }

    #[test]
    fn step_five_substitutes_the_fixed_price_and_expects_json() {
        let built = build_prompt(5, &extraction());
        assert!(built.expects_json);
        assert!(built.text.contains("Price: $37"));
        assert!(built.text.contains("Morning Momentum"));
        assert!(!built.text.contains("{price}"));
        assert!(!built.text.contains("{pillars}"));
    }

    #[test]
    fn other_steps_render_the_continuation_prompt() {
        for step in [3, 4, 6, 7, 8] {
            let built = build_prompt(step, &extraction());
            assert!(!built.expects_json);
            assert!(built.text.contains(&format!("step {step}")));
            assert!(built.text.contains("Morning Momentum"));
            assert!(built.text.contains("calm mornings"));
        }
    }
}
