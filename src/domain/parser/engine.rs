//! The rule-based parse tier and the shared scoring/clarification logic
//! applied to every tier's output.

use crate::domain::catalog::Product;
use crate::domain::parser::confidence::{decide, item_confidence, overall_confidence, ParseDecision};
use crate::domain::parser::matcher::match_product;
use crate::domain::parser::normalize::normalize_input;
use crate::domain::parser::patterns::{parse_line, split_lines};
use crate::domain::parser::session::{
    clarification_for, Clarification, ClarificationAnswer, ClarificationKind, ParsedItem,
};
use crate::domain::parser::units::normalize_unit;
use rust_decimal::Decimal;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct ParserConfig {
    /// Overall confidence at or above which the order proceeds unattended.
    pub auto_accept: u8,
    /// Overall confidence at or above which we ask instead of rejecting.
    pub needs_review: u8,
    /// Fuzzy-match gate for the product ladder.
    pub min_similarity: f64,
    /// Per-item confidence penalty for each pending clarification.
    pub clarification_penalty: u8,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            auto_accept: 80,
            needs_review: 50,
            min_similarity: 0.65,
            clarification_penalty: 5,
        }
    }
}

/// Items plus their open questions, before session bookkeeping.
#[derive(Debug, Clone)]
pub struct ParseDraft {
    pub items: Vec<ParsedItem>,
    pub clarifications: Vec<Clarification>,
}

impl ParseDraft {
    pub fn overall_confidence(&self) -> u8 {
        let confidences: Vec<u8> = self.items.iter().map(|i| i.confidence).collect();
        overall_confidence(&confidences, self.clarifications.len())
    }

    pub fn decision(&self, cfg: &ParserConfig) -> ParseDecision {
        decide(self.overall_confidence(), cfg.auto_accept, cfg.needs_review)
    }
}

pub struct ParseEngine {
    config: ParserConfig,
}

impl ParseEngine {
    pub fn new(config: ParserConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Rule-based parse of raw text against the product catalog. Never
    /// fails: unrecognizable lines become ambiguous-product questions.
    pub fn parse(&self, raw: &str, products: &[Product]) -> ParseDraft {
        let normalized = normalize_input(raw);
        let mut items = Vec::new();
        let mut clarifications = Vec::new();

        for line in split_lines(&normalized) {
            let Some(raw_item) = parse_line(&line) else {
                continue;
            };
            let matched = match_product(products, &raw_item.product_text, self.config.min_similarity);

            let mut pending: Vec<ClarificationKind> = Vec::new();
            if matched.is_none() {
                pending.push(ClarificationKind::AmbiguousProduct);
            }
            if raw_item.quantity.is_none() {
                pending.push(ClarificationKind::MissingQuantity);
            }

            // Unit handling: adopt the product's canonical unit when the
            // buyer omitted one; flag a class mismatch as invalid.
            let mut unit = raw_item.unit.clone();
            let mut normalized_qty = None;
            let mut normalized_unit = None;
            if let Some(ref m) = matched {
                match raw_item.unit.as_deref() {
                    Some(u) => match normalize_unit(u) {
                        Some(cu) => {
                            if cu.canonical != m.unit && m.unit != "piece" {
                                pending.push(ClarificationKind::InvalidUnit);
                            } else {
                                normalized_unit = Some(cu.canonical.to_string());
                                normalized_qty = raw_item.quantity.map(|q| q * cu.factor);
                            }
                        }
                        None => pending.push(ClarificationKind::InvalidUnit),
                    },
                    None => {
                        unit = Some(m.unit.clone());
                        normalized_unit = Some(m.unit.clone());
                        normalized_qty = raw_item.quantity;
                    }
                }
            }

            let match_conf = matched.as_ref().map(|m| m.confidence).unwrap_or(40);
            let penalty = self.config.clarification_penalty * pending.len() as u8;
            let confidence = item_confidence(raw_item.pattern.base_weight(), match_conf, penalty);

            let item = ParsedItem {
                input_text: line.clone(),
                product_id: matched.as_ref().map(|m| m.product_id),
                product_name: matched.as_ref().map(|m| m.product_name.clone()),
                sku: matched.as_ref().map(|m| m.sku.clone()),
                quantity: raw_item.quantity,
                unit,
                normalized_qty,
                normalized_unit,
                confidence,
            };

            let index = items.len();
            for kind in pending {
                clarifications.push(clarification_for(kind, index, &item));
            }
            items.push(item);
        }

        ParseDraft {
            items,
            clarifications,
        }
    }

    /// Merges clarification answers into a draft and rescores the touched
    /// items. Unanswered questions stay pending.
    pub fn apply_answers(
        &self,
        draft: &mut ParseDraft,
        answers: &[ClarificationAnswer],
        products: &[Product],
    ) {
        for answer in answers {
            let Some(position) = draft
                .clarifications
                .iter()
                .position(|c| c.item_index == answer.item_index)
            else {
                continue;
            };
            let clarification = draft.clarifications.remove(position);
            let Some(item) = draft.items.get_mut(clarification.item_index) else {
                continue;
            };

            match clarification.kind {
                ClarificationKind::MissingQuantity => {
                    apply_quantity_answer(item, &answer.answer);
                }
                ClarificationKind::InvalidUnit => {
                    if let Some(cu) = normalize_unit(answer.answer.trim()) {
                        item.unit = Some(answer.answer.trim().to_string());
                        item.normalized_unit = Some(cu.canonical.to_string());
                        item.normalized_qty = item.quantity.map(|q| q * cu.factor);
                    }
                }
                ClarificationKind::AmbiguousProduct => {
                    if let Some(m) =
                        match_product(products, answer.answer.trim(), self.config.min_similarity)
                    {
                        item.product_id = Some(m.product_id);
                        item.product_name = Some(m.product_name.clone());
                        item.sku = Some(m.sku.clone());
                        item.confidence = item.confidence.max(m.confidence);
                        if item.normalized_unit.is_none() {
                            item.normalized_unit = Some(m.unit.clone());
                            item.normalized_qty = item.quantity;
                        }
                    }
                }
            }

            // Resolved questions give the item back its penalty.
            let remaining = draft
                .clarifications
                .iter()
                .filter(|c| c.item_index == clarification.item_index)
                .count() as u8;
            if remaining == 0 && item.product_id.is_some() && item.quantity.is_some() {
                item.confidence = item
                    .confidence
                    .saturating_add(self.config.clarification_penalty);
            }
        }
    }
}

fn apply_quantity_answer(item: &mut ParsedItem, answer: &str) {
    let normalized = normalize_input(answer);
    let tokens: Vec<&str> = normalized.split_whitespace().collect();
    let qty = tokens.first().and_then(|t| Decimal::from_str(t).ok());
    let Some(qty) = qty.filter(|q| *q > Decimal::ZERO) else {
        return;
    };
    item.quantity = Some(qty);
    if let Some(cu) = tokens.get(1).and_then(|t| normalize_unit(t)) {
        item.unit = Some(tokens[1].to_string());
        item.normalized_unit = Some(cu.canonical.to_string());
        item.normalized_qty = Some(qty * cu.factor);
    } else {
        item.normalized_qty = Some(qty);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn product(sku: &str, name: &str, unit: &str, aliases: &[&str]) -> Product {
        Product {
            id: Uuid::new_v4(),
            sku: sku.to_string(),
            name: name.to_string(),
            category: "staples".to_string(),
            unit: unit.to_string(),
            aliases: aliases.iter().map(|s| s.to_string()).collect(),
            created_at: Utc::now(),
        }
    }

    fn catalog() -> Vec<Product> {
        vec![
            product("RICE-MIN-25", "Rice", "kg", &["chal", "miniket rice"]),
            product("OIL-SOY-5", "Oil", "l", &["soybean oil", "tel"]),
            product("EGG-FRM-12", "Eggs", "piece", &["dim"]),
        ]
    }

    #[test]
    fn test_happy_two_item_parse() {
        let engine = ParseEngine::new(ParserConfig::default());
        let draft = engine.parse("10 kg rice, 5 l oil", &catalog());
        assert_eq!(draft.items.len(), 2);
        assert!(draft.clarifications.is_empty());
        assert_eq!(draft.items[0].normalized_qty, Some(dec!(10)));
        assert_eq!(draft.items[1].normalized_unit.as_deref(), Some("l"));
        assert_eq!(draft.decision(&ParserConfig::default()), ParseDecision::Proceed);
    }

    #[test]
    fn test_ocr_damaged_line_recovers() {
        let engine = ParseEngine::new(ParserConfig::default());
        let draft = engine.parse("1O kg r1ce, 5 L 0il", &catalog());
        assert_eq!(draft.items.len(), 2);
        assert!(draft.clarifications.is_empty());
        assert_eq!(draft.items[0].quantity, Some(dec!(10)));
        assert_eq!(draft.items[0].product_name.as_deref(), Some("Rice"));
        assert_eq!(draft.items[1].product_name.as_deref(), Some("Oil"));
        assert!(draft.overall_confidence() >= 80);
    }

    #[test]
    fn test_bare_product_asks_for_quantity() {
        let engine = ParseEngine::new(ParserConfig::default());
        let draft = engine.parse("chal", &catalog());
        assert_eq!(draft.items.len(), 1);
        assert_eq!(draft.clarifications.len(), 1);
        assert_eq!(
            draft.clarifications[0].kind,
            ClarificationKind::MissingQuantity
        );
    }

    #[test]
    fn test_unknown_product_is_ambiguous() {
        let engine = ParseEngine::new(ParserConfig::default());
        let draft = engine.parse("10 kg unobtainium", &catalog());
        assert_eq!(draft.clarifications.len(), 1);
        assert_eq!(
            draft.clarifications[0].kind,
            ClarificationKind::AmbiguousProduct
        );
    }

    #[test]
    fn test_unit_class_mismatch_flagged() {
        let engine = ParseEngine::new(ParserConfig::default());
        let draft = engine.parse("10 l rice", &catalog());
        assert!(draft
            .clarifications
            .iter()
            .any(|c| c.kind == ClarificationKind::InvalidUnit));
    }

    #[test]
    fn test_dozen_normalizes_to_pieces() {
        let engine = ParseEngine::new(ParserConfig::default());
        let draft = engine.parse("2 dozen eggs", &catalog());
        assert_eq!(draft.items[0].normalized_qty, Some(dec!(24)));
        assert_eq!(draft.items[0].normalized_unit.as_deref(), Some("piece"));
    }

    #[test]
    fn test_quantity_answer_merges_and_rescores() {
        let engine = ParseEngine::new(ParserConfig::default());
        let mut draft = engine.parse("chal", &catalog());
        let before = draft.items[0].confidence;

        engine.apply_answers(
            &mut draft,
            &[ClarificationAnswer {
                item_index: 0,
                answer: "25 kg".to_string(),
            }],
            &catalog(),
        );
        assert!(draft.clarifications.is_empty());
        assert_eq!(draft.items[0].quantity, Some(dec!(25)));
        assert_eq!(draft.items[0].normalized_qty, Some(dec!(25)));
        assert!(draft.items[0].confidence > before);
    }

    #[test]
    fn test_parse_is_idempotent_on_normalized_input() {
        // Parsing a normalized rendering of the parsed items yields the
        // same items at no lower confidence.
        let engine = ParseEngine::new(ParserConfig::default());
        let first = engine.parse("1O kg r1ce", &catalog());
        let rendered = format!(
            "{} {} {}",
            first.items[0].quantity.unwrap(),
            first.items[0].unit.as_deref().unwrap(),
            first.items[0].product_name.as_deref().unwrap()
        );
        let second = engine.parse(&rendered, &catalog());
        assert_eq!(second.items.len(), 1);
        assert_eq!(second.items[0].product_id, first.items[0].product_id);
        assert!(second.items[0].confidence >= first.items[0].confidence);
    }
}
