//! Results normalization.
//!
//! The Exchange has grown several result payload shapes: tallies nested
//! under `results` or at the top level, keyed as `totals` or `counts`,
//! with optional participation and weight fields. Everything is reduced to
//! one canonical [`ResultsSummary`] here, at the boundary, so nothing else
//! ever branches on payload shape.
//!
//! Absent numeric fields become `None`, never zero: presentation must be
//! able to distinguish "unknown" from "nobody voted".

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Canonical tally shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultsSummary {
    /// Weight per option id.
    pub totals: BTreeMap<String, f64>,
    /// Distinct people who voted, when reported.
    pub people_voted: Option<u64>,
    /// Total voting weight represented by the tally.
    pub represented_weight: f64,
    /// Raw vote count, when reported.
    pub total_votes: Option<u64>,
    /// Whether the server has validated the tally, when reported.
    pub validated: Option<bool>,
}

/// Reduce any documented result payload shape to a [`ResultsSummary`].
///
/// Never fails: unrecognized or missing fields degrade to an empty or
/// partial summary.
pub fn normalize(payload: &serde_json::Value) -> ResultsSummary {
    // Tallies may sit at the top level or one level down under `results`.
    let body = payload.get("results").unwrap_or(payload);

    let totals = body
        .get("totals")
        .or_else(|| body.get("counts"))
        .and_then(|v| v.as_object())
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| v.as_f64().map(|n| (k.clone(), n)))
                .collect::<BTreeMap<_, _>>()
        })
        .unwrap_or_default();

    let people_voted = body.get("people_voted").and_then(|v| v.as_u64());
    let total_votes = body.get("total_votes").and_then(|v| v.as_u64());
    let validated = body.get("validated").and_then(|v| v.as_bool());

    // Fallback chain: explicit weight sum, then represented people, then
    // the sum of whatever tallies we have.
    let represented_weight = body
        .get("weights_used")
        .and_then(|w| w.get("sum"))
        .and_then(|v| v.as_f64())
        .or_else(|| body.get("represented_people").and_then(|v| v.as_f64()))
        .unwrap_or_else(|| totals.values().sum());

    ResultsSummary {
        totals,
        people_voted,
        represented_weight,
        total_votes,
        validated,
    }
}
