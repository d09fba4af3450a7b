//! Folding fresh text and analysis into a stored record.

use chrono::{DateTime, Utc};

use super::selection::needs_review;
use crate::analyze::Analysis;
use crate::storage::DocumentRecord;

/// Build the record to write back.
///
/// Starts from `prior` so fields untouched by extraction and analysis carry
/// over. With `analysis = None` (analysis failed) the derived fields keep
/// their prior values. An empty summary from a successful analysis never
/// erases the stored one.
///
/// `needs_review` is recomputed from `text` and the summary the analysis
/// produced in this pass, so a failed or empty analysis leaves the record
/// flagged for the next failed-only run.
pub fn merge_record(
    prior: &DocumentRecord,
    text: String,
    analysis: Option<Analysis>,
    now: DateTime<Utc>,
) -> DocumentRecord {
    let mut updated = prior.clone();
    let fresh_summary = analysis.as_ref().map(|a| a.summary.as_str()).unwrap_or("");
    let flagged = needs_review(&text, fresh_summary);

    if let Some(analysis) = analysis {
        if !analysis.summary.is_empty() {
            updated.summary = analysis.summary;
        }
        updated.severity = analysis.severity;
        updated.entities = analysis.entities;
        updated.legal_codes = analysis.legal_codes;
        updated.violations = analysis.violations;
        updated.contradictions = analysis.contradictions;
    }

    updated.text = text;
    updated.needs_review = flagged;
    updated.last_modified = Some(now);
    updated
}
