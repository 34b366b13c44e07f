//! Parse sessions and the clarification loop.
//!
//! A session holds the parse-in-progress while the buyer answers
//! clarifying questions. State machine:
//! `open -> awaiting_clarification <-> open -> accepted | expired | rejected`.

use crate::domain::errors::ParseError;
use crate::domain::types::{InputSource, ProductId, RetailerId};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Open,
    AwaitingClarification,
    Accepted,
    Expired,
    Rejected,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Open => write!(f, "open"),
            SessionStatus::AwaitingClarification => write!(f, "awaiting_clarification"),
            SessionStatus::Accepted => write!(f, "accepted"),
            SessionStatus::Expired => write!(f, "expired"),
            SessionStatus::Rejected => write!(f, "rejected"),
        }
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(SessionStatus::Open),
            "awaiting_clarification" => Ok(SessionStatus::AwaitingClarification),
            "accepted" => Ok(SessionStatus::Accepted),
            "expired" => Ok(SessionStatus::Expired),
            "rejected" => Ok(SessionStatus::Rejected),
            other => Err(format!("Unknown session status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClarificationKind {
    MissingQuantity,
    InvalidUnit,
    AmbiguousProduct,
}

/// A typed question back to the buyer about one parsed item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clarification {
    pub kind: ClarificationKind,
    pub item_index: usize,
    pub question: String,
    pub suggestions: Vec<String>,
}

/// The buyer's answer, merged back into the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClarificationAnswer {
    pub item_index: usize,
    pub answer: String,
}

/// Which extraction tier produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtractionTier {
    PrimaryLlm,
    FallbackLlm,
    RuleBased,
}

impl fmt::Display for ExtractionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionTier::PrimaryLlm => write!(f, "primary_llm"),
            ExtractionTier::FallbackLlm => write!(f, "fallback_llm"),
            ExtractionTier::RuleBased => write!(f, "rule_based"),
        }
    }
}

/// One parsed order line after product matching and unit normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedItem {
    pub input_text: String,
    pub product_id: Option<ProductId>,
    pub product_name: Option<String>,
    pub sku: Option<String>,
    pub quantity: Option<Decimal>,
    pub unit: Option<String>,
    pub normalized_qty: Option<Decimal>,
    pub normalized_unit: Option<String>,
    pub confidence: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseSession {
    pub id: Uuid,
    pub retailer_id: RetailerId,
    pub source: InputSource,
    pub raw_input: String,
    pub items: Vec<ParsedItem>,
    pub confidence: u8,
    pub needs_clarification: bool,
    pub clarifications: Vec<Clarification>,
    pub status: SessionStatus,
    pub extraction_tier: ExtractionTier,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ParseSession {
    pub const DEFAULT_TTL_MINUTES: i64 = 30;

    pub fn new(
        retailer_id: RetailerId,
        source: InputSource,
        raw_input: String,
        tier: ExtractionTier,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            retailer_id,
            source,
            raw_input,
            items: Vec::new(),
            confidence: 0,
            needs_clarification: false,
            clarifications: Vec::new(),
            status: SessionStatus::Open,
            extraction_tier: tier,
            created_at: now,
            expires_at: now + Duration::minutes(Self::DEFAULT_TTL_MINUTES),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Checks the session can still accept clarification answers.
    pub fn ensure_resumable(&self, now: DateTime<Utc>) -> Result<(), ParseError> {
        if self.is_expired(now) || self.status == SessionStatus::Expired {
            return Err(ParseError::SessionExpired {
                session_id: self.id,
            });
        }
        match self.status {
            SessionStatus::Open | SessionStatus::AwaitingClarification => Ok(()),
            _ => Err(ParseError::SessionNotFound {
                session_id: self.id,
            }),
        }
    }
}

/// Builds the typed clarification question for an item.
pub fn clarification_for(kind: ClarificationKind, item_index: usize, item: &ParsedItem) -> Clarification {
    let (question, suggestions) = match kind {
        ClarificationKind::MissingQuantity => (
            format!(
                "How much {} do you need?",
                item.product_name.as_deref().unwrap_or(&item.input_text)
            ),
            vec![],
        ),
        ClarificationKind::InvalidUnit => (
            format!(
                "Which unit should we use for {}?",
                item.product_name.as_deref().unwrap_or(&item.input_text)
            ),
            vec!["kg".to_string(), "l".to_string(), "piece".to_string()],
        ),
        ClarificationKind::AmbiguousProduct => (
            format!("Which product did you mean by \"{}\"?", item.input_text),
            vec![],
        ),
    };
    Clarification {
        kind,
        item_index,
        question,
        suggestions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> ParseSession {
        ParseSession::new(
            Uuid::new_v4(),
            InputSource::WhatsApp,
            "10 kg rice".to_string(),
            ExtractionTier::RuleBased,
        )
    }

    #[test]
    fn test_new_session_is_open_with_ttl() {
        let s = session();
        assert_eq!(s.status, SessionStatus::Open);
        assert!(!s.is_expired(Utc::now()));
        assert!(s.is_expired(Utc::now() + Duration::minutes(31)));
    }

    #[test]
    fn test_resumable_states() {
        let mut s = session();
        assert!(s.ensure_resumable(Utc::now()).is_ok());
        s.status = SessionStatus::AwaitingClarification;
        assert!(s.ensure_resumable(Utc::now()).is_ok());
        s.status = SessionStatus::Accepted;
        assert!(s.ensure_resumable(Utc::now()).is_err());
    }

    #[test]
    fn test_expired_session_not_resumable() {
        let s = session();
        let later = Utc::now() + Duration::hours(1);
        assert!(matches!(
            s.ensure_resumable(later),
            Err(ParseError::SessionExpired { .. })
        ));
    }

    #[test]
    fn test_clarification_question_text() {
        let item = ParsedItem {
            input_text: "rice".to_string(),
            product_id: None,
            product_name: Some("Miniket Rice".to_string()),
            sku: None,
            quantity: None,
            unit: None,
            normalized_qty: None,
            normalized_unit: None,
            confidence: 70,
        };
        let c = clarification_for(ClarificationKind::MissingQuantity, 0, &item);
        assert!(c.question.contains("Miniket Rice"));
        assert_eq!(c.item_index, 0);
    }
}
