// Cascading Re-evaluator scope resolution
//
// A re-evaluation always walks every booking in chronological order so the
// shared usage ledger is complete, but only a target subset has its persisted
// rows rewritten. The scope decides that subset.

use std::collections::HashSet;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::promotions::types::BookingSnapshot;

/// Which bookings a re-evaluation run is allowed to rewrite
#[derive(Debug, Clone)]
pub enum ReevaluationScope {
    /// An explicit set of bookings
    Bookings(HashSet<Uuid>),
    /// Every booking checking in on or after the date. Inclusive because
    /// same-day stays are ordered among themselves by creation time, so a
    /// mutation can shift budget between siblings sharing the date.
    After(NaiveDate),
    /// Bookings carrying one of the listed promotions; the carrying set is
    /// resolved by the caller from persisted rows before the run starts
    Carrying(HashSet<Uuid>),
    /// Every booking
    All,
}

/// Resolve the scope to the set of booking ids whose rows will be rewritten
pub fn resolve_targets(scope: &ReevaluationScope, bookings: &[BookingSnapshot]) -> HashSet<Uuid> {
    match scope {
        ReevaluationScope::Bookings(ids) => bookings
            .iter()
            .filter(|b| ids.contains(&b.id))
            .map(|b| b.id)
            .collect(),
        ReevaluationScope::After(date) => bookings
            .iter()
            .filter(|b| b.check_in >= *date)
            .map(|b| b.id)
            .collect(),
        ReevaluationScope::Carrying(ids) => bookings
            .iter()
            .filter(|b| ids.contains(&b.id))
            .map(|b| b.id)
            .collect(),
        ReevaluationScope::All => bookings.iter().map(|b| b.id).collect(),
    }
}
