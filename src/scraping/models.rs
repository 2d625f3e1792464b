use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::PortalConfig;

/// Key the portal expects to carry the postback control name.
pub const EVENT_TARGET: &str = "__EVENTTARGET";
/// Key the portal expects to carry the postback argument.
pub const EVENT_ARGUMENT: &str = "__EVENTARGUMENT";

// ============================================================================
// SESSION STATE
// ============================================================================

/// Bag of hidden-field key/values that must be round-tripped between
/// requests. The server embeds its pagination cursor in these fields, so
/// every key extracted from the latest response has to be replayed verbatim
/// on the next POST. The two event keys are the only ones the walker is
/// allowed to overwrite.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    fields: BTreeMap<String, String>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns a new state with the postback target/argument pair applied.
    /// These two keys always override any same-named field extracted from
    /// the page; everything else is carried over untouched.
    pub fn with_postback(&self, target: &str, argument: &str) -> Self {
        let mut next = self.clone();
        next.insert(EVENT_TARGET, target);
        next.insert(EVENT_ARGUMENT, argument);
        next
    }

    /// Field pairs in stable (sorted) order, ready for a form body.
    pub fn form_fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

// ============================================================================
// RECORDS
// ============================================================================

/// One historical invoice entry from the listing table. The `itu` token is
/// the portal's document identifier and maps 1:1 to one PDF; the date is
/// used both for period filtering and for final merge ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub date: NaiveDate,
    pub itu: String,
}

/// Target billing period. Construction validates the month so the first
/// day of the period is always available for the stop-condition check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetPeriod {
    month: u32,
    year: i32,
    first_day: NaiveDate,
}

impl TargetPeriod {
    pub fn new(month: u32, year: i32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|first_day| Self {
            month,
            year,
            first_day,
        })
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn first_day(&self) -> NaiveDate {
        self.first_day
    }

    /// In scope iff month and year match exactly.
    pub fn contains(&self, date: NaiveDate) -> bool {
        use chrono::Datelike;
        date.month() == self.month && date.year() == self.year
    }
}

/// Result of processing one listing page: the in-range records it yielded
/// plus either the session state for the next postback or nothing (no more
/// pages, or the stop condition was reached).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageOutcome {
    pub records: Vec<Record>,
    pub oldest_seen: Option<NaiveDate>,
    pub continuation: Option<SessionState>,
}

// ============================================================================
// QUERY CONTEXT
// ============================================================================

/// Fixed identifiers the portal expects on the bootstrap GET and on every
/// listing POST: recipient RFC, issuer RFC, issuer id and the `externo`
/// flag. Only the recipient varies per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryContext {
    pub rfc_rec: String,
    pub rfc_emi: String,
    pub id_emi: String,
    pub externo: String,
}

impl QueryContext {
    pub fn new(rfc_rec: impl Into<String>, portal: &PortalConfig) -> Self {
        Self {
            rfc_rec: rfc_rec.into(),
            rfc_emi: portal.issuer_rfc.clone(),
            id_emi: portal.issuer_id.clone(),
            externo: portal.externo.clone(),
        }
    }

    pub fn bootstrap_query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("rfcRec", self.rfc_rec.clone()),
            ("rfcEmi", self.rfc_emi.clone()),
            ("idEmi", self.id_emi.clone()),
            ("externo", self.externo.clone()),
        ]
    }

    pub fn form_fields(&self) -> Vec<(String, String)> {
        self.bootstrap_query()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    pub fn pdf_query(&self, itu: &str) -> Vec<(&'static str, String)> {
        vec![
            ("rfcRec", self.rfc_rec.clone()),
            ("itu", itu.to_string()),
            ("rfcEmi", self.rfc_emi.clone()),
        ]
    }
}

// ============================================================================
// RUN SUMMARY
// ============================================================================

/// Final per-run counters reported to the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub records_found: usize,
    pub files_downloaded: usize,
    pub files_merged: usize,
}
