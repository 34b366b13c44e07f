//! Input normalization for the unified parser.
//!
//! Lowercases, collapses whitespace, splits glued quantity/unit tokens
//! ("10kg" -> "10 kg") and repairs the well-known OCR substitutions in both
//! directions: stray letters inside numbers become digits ("1O" -> "10"),
//! stray digits inside words become letters ("0il" -> "oil", "r1ce" ->
//! "rice"). Repairs that still leave a word slightly off are absorbed
//! downstream by the fuzzy product matcher.

/// Normalizes raw order text ahead of line splitting.
pub fn normalize_input(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let mut tokens: Vec<String> = Vec::new();
    for token in lowered.split_whitespace() {
        for piece in split_digit_letter_boundary(token) {
            tokens.push(repair_token(&piece));
        }
    }
    tokens.join(" ")
}

/// "10kg" -> ["10", "kg"]; "rice" -> ["rice"]. Punctuation that matters to
/// line splitting (commas) is preserved on the token it trails.
fn split_digit_letter_boundary(token: &str) -> Vec<String> {
    let trailing_comma = token.ends_with(',');
    let core = token.trim_end_matches(',');

    // Only split when the token is digits followed by letters; mixed SKU
    // forms like "rice-min-25" must stay intact.
    let digits_end = core.chars().take_while(|c| c.is_ascii_digit()).count();
    let mut out = if digits_end > 0
        && digits_end < core.chars().count()
        && core.chars().skip(digits_end).all(|c| c.is_alphabetic())
        && !is_numberish(core)
    {
        let (num, rest) = core.split_at(
            core.char_indices()
                .nth(digits_end)
                .map(|(i, _)| i)
                .unwrap_or(core.len()),
        );
        vec![num.to_string(), rest.to_string()]
    } else {
        vec![core.to_string()]
    };

    if trailing_comma {
        if let Some(last) = out.last_mut() {
            last.push(',');
        }
    }
    out
}

/// A token that is one OCR repair away from being a number ("1o", "5o0").
fn is_numberish(token: &str) -> bool {
    let mut has_digit = false;
    for c in token.chars() {
        match c {
            '0'..='9' | '.' => has_digit = true,
            'o' | 'l' | 'i' | 's' => {}
            _ => return false,
        }
    }
    has_digit
}

fn repair_token(token: &str) -> String {
    let trailing_comma = token.ends_with(',');
    let core = token.trim_end_matches(',');

    let digit_count = core.chars().filter(|c| c.is_ascii_digit()).count();
    let letter_count = core.chars().filter(|c| c.is_alphabetic()).count();
    // "1o" is a broken number, "0il" is a broken word: digits must
    // dominate before we treat the token as a number.
    let repaired = if is_numberish(core) && digit_count >= letter_count && digit_count > 0 {
        // Letters inside a number become digits.
        core.chars()
            .map(|c| match c {
                'o' => '0',
                'l' | 'i' => '1',
                's' => '5',
                other => other,
            })
            .collect::<String>()
    } else {
        // Digits bracketed by letters become letters.
        let chars: Vec<char> = core.chars().collect();
        chars
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                let prev_alpha = i > 0 && chars[i - 1].is_alphabetic();
                let next_alpha = i + 1 < chars.len() && chars[i + 1].is_alphabetic();
                // Bracketed by letters, or at a word edge next to a letter.
                let bracketed = (prev_alpha && next_alpha)
                    || (i == 0 && next_alpha)
                    || (i + 1 == chars.len() && prev_alpha);
                if bracketed {
                    match c {
                        '0' => 'o',
                        '1' => 'i',
                        '5' => 's',
                        other => other,
                    }
                } else {
                    c
                }
            })
            .collect()
    };

    if trailing_comma {
        format!("{},", repaired)
    } else {
        repaired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercase_and_whitespace() {
        assert_eq!(normalize_input("  10 KG   Rice "), "10 kg rice");
    }

    #[test]
    fn test_glued_quantity_unit_split() {
        assert_eq!(normalize_input("10kg rice"), "10 kg rice");
        assert_eq!(normalize_input("5l oil"), "5 l oil");
    }

    #[test]
    fn test_ocr_number_repair() {
        assert_eq!(normalize_input("1O kg rice"), "10 kg rice");
        assert_eq!(normalize_input("2s kg"), "25 kg");
    }

    #[test]
    fn test_ocr_word_repair() {
        assert_eq!(normalize_input("0il"), "oil");
        assert_eq!(normalize_input("r1ce"), "rice");
    }

    #[test]
    fn test_scenario_ocr_line() {
        assert_eq!(
            normalize_input("1O kg r1ce, 5 L 0il"),
            "10 kg rice, 5 l oil"
        );
    }

    #[test]
    fn test_sku_tokens_left_alone() {
        assert_eq!(normalize_input("RICE-MIN-25 x10"), "rice-min-25 x10");
    }

    #[test]
    fn test_commas_preserved() {
        assert_eq!(normalize_input("10 kg rice, 5 l oil"), "10 kg rice, 5 l oil");
    }
}
