//! Retailer and vendor aggregates.
//!
//! `Retailer` carries the credit triple (limit, outstanding debt, available
//! credit). The triple is only ever mutated by the ledger-append path; the
//! `credit_invariant_holds` check is used by tests and the recovery sweep.

use crate::domain::types::{RetailerId, VendorId};
use chrono::{DateTime, FixedOffset, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Retailer {
    pub id: RetailerId,
    pub name: String,
    pub phone: String,
    pub credit_limit: Decimal,
    pub outstanding_debt: Decimal,
    pub available_credit: Decimal,
    /// 0-100; maintained through the audit-logged admin path only.
    pub risk_score: u8,
    pub is_approved: bool,
    pub is_active: bool,
    pub high_risk_override: bool,
    pub delivery_zone: Option<String>,
    pub district: Option<String>,
    pub working_hours: Option<WorkingHours>,
    pub created_at: DateTime<Utc>,
}

impl Retailer {
    /// `available_credit + outstanding_debt == credit_limit` must hold at
    /// all times outside of the atomic write transaction.
    pub fn credit_invariant_holds(&self) -> bool {
        self.available_credit + self.outstanding_debt == self.credit_limit
            && self.available_credit >= Decimal::ZERO
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vendor {
    pub id: VendorId,
    pub name: String,
    pub phone: String,
    pub is_approved: bool,
    pub is_active: bool,
    /// Derived from event history by the analytics recompute; never hand-edited.
    pub reliability_score: Decimal,
    pub working_hours: WorkingHours,
    pub max_active_orders: u32,
    pub max_pending_orders: u32,
    pub delivery_zones: Vec<String>,
    pub district: String,
    pub created_at: DateTime<Utc>,
}

/// Daily `[start, end)` window in a fixed-offset timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingHours {
    pub start: NaiveTime,
    pub end: NaiveTime,
    /// Offset from UTC in minutes (e.g. 330 for +05:30).
    pub utc_offset_minutes: i32,
}

impl WorkingHours {
    pub fn new(start: NaiveTime, end: NaiveTime, utc_offset_minutes: i32) -> Self {
        Self {
            start,
            end,
            utc_offset_minutes,
        }
    }

    /// Whether `now` falls within the window, evaluated in the vendor's
    /// local timezone. The end bound is exclusive: a `[9,18)` window
    /// excludes exactly 18:00.
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        let offset = match FixedOffset::east_opt(self.utc_offset_minutes * 60) {
            Some(o) => o,
            None => return false,
        };
        let local = now.with_timezone(&offset).time();
        if self.start <= self.end {
            local >= self.start && local < self.end
        } else {
            // Overnight window, e.g. 22:00-06:00
            local >= self.start || local < self.end
        }
    }
}
