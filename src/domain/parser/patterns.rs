//! Line tokenization and pattern recognition.
//!
//! A normalized input is first split into candidate line tokens (newlines,
//! commas, "and" separators, numbered bullets), then each line is matched
//! against the recognized shapes in order. Every shape carries a base
//! confidence weight which later caps the item confidence.

use crate::domain::parser::units::is_unit_token;
use rust_decimal::Decimal;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinePattern {
    SkuQty,
    QtyUnitProduct,
    ProductQtyUnit,
    ProductUnitQty,
    BareProduct,
    Freeform,
}

impl LinePattern {
    /// Base confidence weight for items recognized through this shape.
    pub fn base_weight(&self) -> u8 {
        match self {
            LinePattern::SkuQty => 95,
            LinePattern::QtyUnitProduct => 90,
            LinePattern::ProductQtyUnit => 85,
            LinePattern::ProductUnitQty => 80,
            LinePattern::Freeform => 75,
            LinePattern::BareProduct => 70,
        }
    }
}

/// One recognized line before product matching.
#[derive(Debug, Clone, PartialEq)]
pub struct RawLineItem {
    pub product_text: String,
    pub quantity: Option<Decimal>,
    pub unit: Option<String>,
    pub pattern: LinePattern,
}

/// Splits normalized input into candidate lines.
pub fn split_lines(input: &str) -> Vec<String> {
    input
        .split(['\n', ','])
        .flat_map(|chunk| chunk.split(" and "))
        .map(strip_bullet)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn strip_bullet(line: &str) -> &str {
    let trimmed = line.trim_start();
    // "1. rice" / "2) oil" style bullets. A space after the delimiter is
    // required so decimals like "1.5 kg" survive intact.
    if let Some(rest) = trimmed
        .split_once(['.', ')'])
        .filter(|(head, rest)| {
            !head.is_empty()
                && head.chars().all(|c| c.is_ascii_digit())
                && rest.starts_with(' ')
        })
        .map(|(_, rest)| rest)
    {
        return rest;
    }
    trimmed
}

fn parse_qty(token: &str) -> Option<Decimal> {
    Decimal::from_str(token).ok().filter(|d| *d > Decimal::ZERO)
}

/// Looks like a catalog SKU: hyphenated alphanumeric ("rice-min-25").
fn is_sku_like(token: &str) -> bool {
    token.contains('-') && token.chars().all(|c| c.is_alphanumeric() || c == '-')
}

/// Matches a single line against the recognized shapes, in order.
pub fn parse_line(line: &str) -> Option<RawLineItem> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.is_empty() {
        return None;
    }

    // SKU x QTY, either glued ("rice-min-25x10") or spaced ("rice-min-25 x10")
    if let Some(item) = try_sku_qty(&tokens) {
        return Some(item);
    }

    // QTY UNIT PRODUCT
    if tokens.len() >= 3 {
        if let (Some(qty), true) = (parse_qty(tokens[0]), is_unit_token(tokens[1])) {
            return Some(RawLineItem {
                product_text: tokens[2..].join(" "),
                quantity: Some(qty),
                unit: Some(tokens[1].to_string()),
                pattern: LinePattern::QtyUnitProduct,
            });
        }
    }

    // PRODUCT QTY UNIT
    if tokens.len() >= 3 {
        let n = tokens.len();
        if let (Some(qty), true) = (parse_qty(tokens[n - 2]), is_unit_token(tokens[n - 1])) {
            return Some(RawLineItem {
                product_text: tokens[..n - 2].join(" "),
                quantity: Some(qty),
                unit: Some(tokens[n - 1].to_string()),
                pattern: LinePattern::ProductQtyUnit,
            });
        }
    }

    // PRODUCT UNIT QTY
    if tokens.len() >= 3 {
        let n = tokens.len();
        if let (true, Some(qty)) = (is_unit_token(tokens[n - 2]), parse_qty(tokens[n - 1])) {
            return Some(RawLineItem {
                product_text: tokens[..n - 2].join(" "),
                quantity: Some(qty),
                unit: Some(tokens[n - 2].to_string()),
                pattern: LinePattern::ProductUnitQty,
            });
        }
    }

    // QTY PRODUCT (no unit): common freeform shorthand "10 rice"
    if tokens.len() >= 2 {
        if let Some(qty) = parse_qty(tokens[0]) {
            return Some(RawLineItem {
                product_text: tokens[1..].join(" "),
                quantity: Some(qty),
                unit: None,
                pattern: LinePattern::Freeform,
            });
        }
        // PRODUCT QTY (trailing bare quantity)
        let n = tokens.len();
        if let Some(qty) = parse_qty(tokens[n - 1]) {
            return Some(RawLineItem {
                product_text: tokens[..n - 1].join(" "),
                quantity: Some(qty),
                unit: None,
                pattern: LinePattern::Freeform,
            });
        }
    }

    // Bare PRODUCT: quantity must be clarified
    if tokens.iter().all(|t| parse_qty(t).is_none()) {
        return Some(RawLineItem {
            product_text: tokens.join(" "),
            quantity: None,
            unit: None,
            pattern: LinePattern::BareProduct,
        });
    }

    None
}

fn try_sku_qty(tokens: &[&str]) -> Option<RawLineItem> {
    // "rice-min-25 x10" or "rice-min-25 x 10"
    if tokens.len() >= 2 && is_sku_like(tokens[0]) {
        let rest = tokens[1..].join("");
        if let Some(qty_str) = rest.strip_prefix('x').or_else(|| rest.strip_prefix('×')) {
            if let Some(qty) = parse_qty(qty_str) {
                return Some(RawLineItem {
                    product_text: tokens[0].to_string(),
                    quantity: Some(qty),
                    unit: None,
                    pattern: LinePattern::SkuQty,
                });
            }
        }
    }
    // Glued: "rice-min-25x10"
    if tokens.len() == 1 {
        let token = tokens[0];
        if let Some(pos) = token.rfind(['x', '×']) {
            let (sku, qty_part) = token.split_at(pos);
            let qty_part = &qty_part[1..];
            if is_sku_like(sku) && !qty_part.is_empty() {
                if let Some(qty) = parse_qty(qty_part) {
                    return Some(RawLineItem {
                        product_text: sku.to_string(),
                        quantity: Some(qty),
                        unit: None,
                        pattern: LinePattern::SkuQty,
                    });
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_split_on_commas_and_and() {
        assert_eq!(
            split_lines("10 kg rice, 5 l oil and 2 dozen eggs"),
            vec!["10 kg rice", "5 l oil", "2 dozen eggs"]
        );
    }

    #[test]
    fn test_split_strips_bullets() {
        assert_eq!(
            split_lines("1. 10 kg rice\n2. 5 l oil"),
            vec!["10 kg rice", "5 l oil"]
        );
    }

    #[test]
    fn test_decimal_quantity_is_not_a_bullet() {
        assert_eq!(split_lines("1.5 kg rice"), vec!["1.5 kg rice"]);
        let item = parse_line("1.5 kg rice").unwrap();
        assert_eq!(item.quantity, Some(dec!(1.5)));
    }

    #[test]
    fn test_qty_unit_product() {
        let item = parse_line("10 kg rice").unwrap();
        assert_eq!(item.pattern, LinePattern::QtyUnitProduct);
        assert_eq!(item.quantity, Some(dec!(10)));
        assert_eq!(item.unit.as_deref(), Some("kg"));
        assert_eq!(item.product_text, "rice");
    }

    #[test]
    fn test_product_qty_unit() {
        let item = parse_line("miniket rice 25 kg").unwrap();
        assert_eq!(item.pattern, LinePattern::ProductQtyUnit);
        assert_eq!(item.quantity, Some(dec!(25)));
        assert_eq!(item.product_text, "miniket rice");
    }

    #[test]
    fn test_product_unit_qty() {
        let item = parse_line("soybean oil litre 5").unwrap();
        assert_eq!(item.pattern, LinePattern::ProductUnitQty);
        assert_eq!(item.quantity, Some(dec!(5)));
        assert_eq!(item.unit.as_deref(), Some("litre"));
    }

    #[test]
    fn test_sku_qty_spaced_and_glued() {
        let spaced = parse_line("rice-min-25 x10").unwrap();
        assert_eq!(spaced.pattern, LinePattern::SkuQty);
        assert_eq!(spaced.quantity, Some(dec!(10)));
        assert_eq!(spaced.product_text, "rice-min-25");

        let glued = parse_line("rice-min-25x10").unwrap();
        assert_eq!(glued.pattern, LinePattern::SkuQty);
        assert_eq!(glued.quantity, Some(dec!(10)));
    }

    #[test]
    fn test_bare_product_needs_clarification() {
        let item = parse_line("rice").unwrap();
        assert_eq!(item.pattern, LinePattern::BareProduct);
        assert_eq!(item.quantity, None);
    }

    #[test]
    fn test_qty_without_unit_is_freeform() {
        let item = parse_line("10 rice").unwrap();
        assert_eq!(item.pattern, LinePattern::Freeform);
        assert_eq!(item.quantity, Some(dec!(10)));
        assert_eq!(item.unit, None);
    }

    #[test]
    fn test_pattern_weights_ordered() {
        assert!(LinePattern::SkuQty.base_weight() > LinePattern::QtyUnitProduct.base_weight());
        assert!(LinePattern::BareProduct.base_weight() < LinePattern::Freeform.base_weight());
        assert_eq!(LinePattern::SkuQty.base_weight(), 95);
        assert_eq!(LinePattern::BareProduct.base_weight(), 70);
    }
}
