//! Confidence arithmetic for parsed items.

/// Per-item confidence: the pattern weight caps the match confidence, and
/// each pending clarification on the item subtracts a penalty.
pub fn item_confidence(pattern_weight: u8, match_confidence: u8, clarification_penalty: u8) -> u8 {
    pattern_weight
        .min(match_confidence)
        .saturating_sub(clarification_penalty)
}

/// Overall confidence: mean of item confidences minus 10 per pending
/// clarification, floored at zero. An empty item list scores zero.
pub fn overall_confidence(item_confidences: &[u8], pending_clarifications: usize) -> u8 {
    if item_confidences.is_empty() {
        return 0;
    }
    let sum: u32 = item_confidences.iter().map(|&c| c as u32).sum();
    let mean = (sum as f64 / item_confidences.len() as f64).round() as u32;
    mean.saturating_sub(10 * pending_clarifications as u32)
        .min(100) as u8
}

/// What the caller should do with a parse at this confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseDecision {
    Proceed,
    NeedsReview,
    Reject,
}

pub fn decide(overall: u8, auto_accept: u8, needs_review: u8) -> ParseDecision {
    if overall >= auto_accept {
        ParseDecision::Proceed
    } else if overall >= needs_review {
        ParseDecision::NeedsReview
    } else {
        ParseDecision::Reject
    }
}
