pub mod confidence;
pub mod engine;
pub mod matcher;
pub mod normalize;
pub mod patterns;
pub mod session;
pub mod units;

pub use confidence::ParseDecision;
pub use engine::{ParseDraft, ParseEngine, ParserConfig};
pub use matcher::{match_product, MatchMethod, ProductMatch};
pub use session::{
    Clarification, ClarificationAnswer, ClarificationKind, ExtractionTier, ParseSession,
    ParsedItem, SessionStatus,
};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The public contract of `Parse` and `Clarify`: always returned, never an
/// error, regardless of what the extraction tiers did internally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseResult {
    pub session_id: Uuid,
    pub items: Vec<ParsedItem>,
    pub overall_confidence: u8,
    pub needs_clarification: bool,
    pub clarifications: Vec<Clarification>,
    pub summary: String,
}

/// Renders a human-readable order summary for confirmations.
pub fn summarize_items(items: &[ParsedItem]) -> String {
    if items.is_empty() {
        return "No items recognized".to_string();
    }
    let parts: Vec<String> = items
        .iter()
        .map(|item| {
            let name = item
                .product_name
                .as_deref()
                .unwrap_or(item.input_text.as_str());
            match (item.quantity, item.unit.as_deref()) {
                (Some(qty), Some(unit)) => format!("{} {} {}", qty, unit, name),
                (Some(qty), None) => format!("{} {}", qty, name),
                _ => format!("{} (quantity pending)", name),
            }
        })
        .collect();
    format!("{} item(s): {}", items.len(), parts.join("; "))
}
