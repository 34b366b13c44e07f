//! Unit recognition and canonicalization.
//!
//! Weight canonicalizes to kg, volume to l, count to piece. The conversion
//! factor maps the recognized unit into its canonical unit, so
//! `normalized_qty = qty * factor`.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitClass {
    Weight,
    Volume,
    Count,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalUnit {
    pub canonical: &'static str,
    pub class: UnitClass,
    pub factor: Decimal,
}

/// Maps a raw unit token to its canonical unit and conversion factor.
pub fn normalize_unit(raw: &str) -> Option<CanonicalUnit> {
    let unit = raw.trim().trim_end_matches('.');
    let (canonical, class, factor) = match unit {
        "kg" | "kgs" | "kilo" | "kilos" | "kilogram" | "kilograms" => {
            ("kg", UnitClass::Weight, dec!(1))
        }
        "g" | "gm" | "gms" | "gram" | "grams" => ("kg", UnitClass::Weight, dec!(0.001)),
        "quintal" | "quintals" => ("kg", UnitClass::Weight, dec!(100)),
        "ton" | "tons" | "tonne" | "tonnes" => ("kg", UnitClass::Weight, dec!(1000)),
        "l" | "ltr" | "ltrs" | "litre" | "litres" | "liter" | "liters" => {
            ("l", UnitClass::Volume, dec!(1))
        }
        "ml" | "mls" => ("l", UnitClass::Volume, dec!(0.001)),
        "piece" | "pieces" | "pc" | "pcs" | "unit" | "units" => {
            ("piece", UnitClass::Count, dec!(1))
        }
        "dozen" | "dozens" | "dz" => ("piece", UnitClass::Count, dec!(12)),
        "box" | "boxes" | "carton" | "cartons" => ("piece", UnitClass::Count, dec!(1)),
        _ => return None,
    };
    Some(CanonicalUnit {
        canonical,
        class,
        factor,
    })
}

/// Whether a token is a recognizable unit at all.
pub fn is_unit_token(raw: &str) -> bool {
    normalize_unit(raw).is_some()
}
