//! Product matching ladder.
//!
//! Each rung is tried in order with decreasing confidence: exact SKU,
//! alias, normalized name, fuzzy edit-distance, full-text token overlap.

use crate::domain::catalog::Product;
use crate::domain::types::ProductId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchMethod {
    ExactSku,
    Alias,
    NormalizedName,
    Fuzzy,
    FullText,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductMatch {
    pub product_id: ProductId,
    pub product_name: String,
    pub sku: String,
    pub unit: String,
    pub confidence: u8,
    pub method: MatchMethod,
}

/// Classic Levenshtein distance.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Similarity ratio in [0,1]: 1 − distance / max_len.
pub fn similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - edit_distance(a, b) as f64 / max_len as f64
}

fn normalized_name(name: &str) -> String {
    name.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn make_match(product: &Product, confidence: u8, method: MatchMethod) -> ProductMatch {
    ProductMatch {
        product_id: product.id,
        product_name: product.name.clone(),
        sku: product.sku.clone(),
        unit: product.unit.clone(),
        confidence,
        method,
    }
}

/// Walks the ladder for `query` against the catalog. `min_similarity`
/// gates the fuzzy rung (default 0.65 from config).
pub fn match_product(
    products: &[Product],
    query: &str,
    min_similarity: f64,
) -> Option<ProductMatch> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return None;
    }

    // 1. Exact SKU
    if let Some(p) = products.iter().find(|p| p.sku.eq_ignore_ascii_case(&query)) {
        return Some(make_match(p, 95, MatchMethod::ExactSku));
    }

    // 2. Exact alias
    if let Some(p) = products.iter().find(|p| p.matches_alias(&query)) {
        return Some(make_match(p, 90, MatchMethod::Alias));
    }

    // 3. Normalized name equality
    if let Some(p) = products
        .iter()
        .find(|p| normalized_name(&p.name) == query)
    {
        return Some(make_match(p, 85, MatchMethod::NormalizedName));
    }

    // 4. Fuzzy edit distance over names and aliases, best ratio wins
    let mut best: Option<(f64, &Product)> = None;
    for p in products {
        let mut ratio = similarity(&normalized_name(&p.name), &query);
        for alias in &p.aliases {
            ratio = ratio.max(similarity(&alias.to_lowercase(), &query));
        }
        if ratio >= min_similarity && best.map(|(r, _)| ratio > r).unwrap_or(true) {
            best = Some((ratio, p));
        }
    }
    if let Some((ratio, p)) = best {
        // Scale into [50, 80]
        let confidence = (50.0 + 30.0 * ratio).round().min(80.0) as u8;
        return Some(make_match(p, confidence, MatchMethod::Fuzzy));
    }

    // 5. Full-text: every query token appears somewhere in name/aliases
    let query_tokens: Vec<&str> = query.split_whitespace().collect();
    let mut best_text: Option<(usize, &Product)> = None;
    for p in products {
        let haystack = format!(
            "{} {}",
            normalized_name(&p.name),
            p.aliases.join(" ").to_lowercase()
        );
        let hits = query_tokens
            .iter()
            .filter(|t| haystack.contains(**t))
            .count();
        if hits == query_tokens.len()
            && !query_tokens.is_empty()
            && best_text.map(|(h, _)| hits > h).unwrap_or(true)
        {
            best_text = Some((hits, p));
        }
    }
    if let Some((hits, p)) = best_text {
        // Scale into [60, 75] by token coverage of the product name
        let name_tokens = normalized_name(&p.name).split_whitespace().count().max(1);
        let coverage = (hits as f64 / name_tokens as f64).min(1.0);
        let confidence = (60.0 + 15.0 * coverage).round() as u8;
        return Some(make_match(p, confidence, MatchMethod::FullText));
    }

    None
}
