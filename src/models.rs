//! Data models for the revenue dashboard.
//!
//! This module contains the CRM wire records (owners, deals, pages) and the
//! aggregated leaderboard structures served to the dashboard.

use chrono::{DateTime, Datelike, Local, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Display name used when an owner id is not in the directory.
pub const UNKNOWN_OWNER: &str = "Unknown";

/// One page of a paginated CRM collection.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
    #[serde(default)]
    pub paging: Option<Paging>,
}

impl<T> Page<T> {
    /// Returns the cursor for the following page, if there is one.
    pub fn next_cursor(&self) -> Option<&str> {
        self.paging
            .as_ref()
            .and_then(|p| p.next.as_ref())
            .and_then(|n| n.after.as_deref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Paging {
    #[serde(default)]
    pub next: Option<NextPage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NextPage {
    #[serde(default)]
    pub after: Option<String>,
}

/// Owner record as returned by the owners endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerRecord {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl OwnerRecord {
    /// First and last name joined by a space, trimmed. Missing parts are empty.
    pub fn display_name(&self) -> String {
        format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or(""),
            self.last_name.as_deref().unwrap_or("")
        )
        .trim()
        .to_string()
    }
}

/// Deal record as returned by the deals endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct DealRecord {
    #[serde(default, deserialize_with = "opt_id_as_string")]
    pub id: Option<String>,
    #[serde(default)]
    pub properties: DealProperties,
}

/// The deal properties requested from the CRM.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DealProperties {
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub hubspot_owner_id: Option<String>,
    #[serde(default)]
    pub dealstage: Option<String>,
    #[serde(default)]
    pub closedate: Option<String>,
}

/// Property names requested from the deals endpoint.
pub const DEAL_PROPERTIES: &str = "amount,hubspot_owner_id,dealstage,closedate";

fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}

fn opt_id_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Calendar month that sales are summed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportingPeriod {
    pub year: i32,
    pub month: u32,
}

impl ReportingPeriod {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    /// The month containing the local wall-clock time.
    pub fn current() -> Self {
        Self::containing(Local::now().date_naive())
    }

    pub fn containing(date: NaiveDate) -> Self {
        Self::new(date.year(), date.month())
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

impl fmt::Display for ReportingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// One dashboard row: total closed-won sales for an allow-listed owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesRow {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Sales")]
    pub sales: f64,
}

impl SalesRow {
    pub fn new(name: impl Into<String>, sales: f64) -> Self {
        Self {
            name: name.into(),
            sales,
        }
    }
}

/// How much of the upstream data a result was computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Completeness {
    Complete,
    Partial,
    Failed,
}

impl Completeness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Completeness::Complete => "complete",
            Completeness::Partial => "partial",
            Completeness::Failed => "failed",
        }
    }
}

impl fmt::Display for Completeness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rendered leaderboard for one reporting period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Leaderboard {
    pub period: ReportingPeriod,
    pub generated_at: DateTime<Utc>,
    pub completeness: Completeness,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub rows: Vec<SalesRow>,
}

impl Leaderboard {
    /// Sum of all rows.
    pub fn total(&self) -> f64 {
        self.rows.iter().map(|r| r.sales).sum()
    }
}
