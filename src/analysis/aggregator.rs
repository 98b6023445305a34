//! Closed-won revenue aggregation.
//!
//! Deals are filtered to the closed-won stage and the reporting period,
//! joined to the owner directory, restricted to the allow-list, and summed
//! per short name.

use crate::config::Config;
use crate::crm::{follow_cursor, CrmSource, FailurePolicy, Fetched};
use crate::directory::{OwnerDirectory, OwnerNames};
use crate::models::{DealProperties, DealRecord, ReportingPeriod, SalesRow};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

/// Filtering and bucketing rules for the leaderboard.
#[derive(Debug, Clone)]
pub struct SalesRules {
    /// Pipeline stage code meaning "closed won".
    pub closed_won_stage: String,
    /// Full owner display name -> short dashboard key.
    pub allowed_owners: BTreeMap<String, String>,
    pub page_limit: u32,
    pub deal_failure: FailurePolicy,
}

impl From<&Config> for SalesRules {
    fn from(config: &Config) -> Self {
        Self {
            closed_won_stage: config.pipeline.closed_won_stage.clone(),
            allowed_owners: config.pipeline.allowed_owners.clone(),
            page_limit: config.crm.page_limit,
            deal_failure: config.pipeline.deal_fetch_failure,
        }
    }
}

/// Why a deal was or was not counted.
#[derive(Debug, Clone, PartialEq)]
pub enum DealVerdict<'a> {
    MissingField,
    OtherStage,
    UnparsableCloseDate(&'a str),
    OutsidePeriod,
    UnparsableAmount(&'a str),
    NotAllowListed(&'a str),
    Counted { short_name: &'a str, amount: f64 },
}

/// Parse a CRM close date into the calendar date in its own offset.
///
/// Accepts RFC 3339 timestamps, naive timestamps and plain dates.
pub fn parse_close_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt.date_naive());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt.date());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

/// Parse a decimal amount string. Non-finite values are rejected.
pub fn parse_amount(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Apply the filtering rules to one deal, in order.
pub fn evaluate_deal<'a>(
    props: &'a DealProperties,
    rules: &'a SalesRules,
    period: ReportingPeriod,
    names: &'a OwnerNames,
) -> DealVerdict<'a> {
    let (Some(stage), Some(close_date), Some(amount), Some(owner_id)) = (
        present(&props.dealstage),
        present(&props.closedate),
        present(&props.amount),
        present(&props.hubspot_owner_id),
    ) else {
        return DealVerdict::MissingField;
    };

    if stage != rules.closed_won_stage {
        return DealVerdict::OtherStage;
    }

    let Some(closed_on) = parse_close_date(close_date) else {
        return DealVerdict::UnparsableCloseDate(close_date);
    };
    if !period.contains(closed_on) {
        return DealVerdict::OutsidePeriod;
    }

    let Some(amount) = parse_amount(amount) else {
        return DealVerdict::UnparsableAmount(amount);
    };

    let owner_name = names.name_for(owner_id);
    match rules.allowed_owners.get(owner_name) {
        Some(short_name) => DealVerdict::Counted {
            short_name: short_name.as_str(),
            amount,
        },
        None => DealVerdict::NotAllowListed(owner_name),
    }
}

/// Running totals per short name, remembering first-seen order.
#[derive(Debug, Default)]
pub struct SalesTally {
    index: HashMap<String, usize>,
    rows: Vec<SalesRow>,
}

impl SalesTally {
    pub fn add(&mut self, short_name: &str, amount: f64) {
        match self.index.get(short_name) {
            Some(&i) => self.rows[i].sales += amount,
            None => {
                self.index.insert(short_name.to_string(), self.rows.len());
                self.rows.push(SalesRow::new(short_name, amount));
            }
        }
    }

    /// Rows sorted by total, highest first. Ties keep first-seen order.
    pub fn into_rows(self) -> Vec<SalesRow> {
        let mut rows = self.rows;
        sort_by_sales_desc(&mut rows);
        rows
    }
}

/// Sort rows by sales, highest first (stable).
pub fn sort_by_sales_desc(rows: &mut [SalesRow]) {
    rows.sort_by(|a, b| {
        b.sales
            .partial_cmp(&a.sales)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

#[derive(Debug, Default)]
struct SkipCounts {
    missing: usize,
    other_stage: usize,
    bad_close_date: usize,
    outside_period: usize,
    bad_amount: usize,
    not_allowed: usize,
}

/// Sum the qualifying deals into sorted leaderboard rows.
pub fn tally_deals(
    deals: &[DealRecord],
    rules: &SalesRules,
    period: ReportingPeriod,
    names: &OwnerNames,
) -> Vec<SalesRow> {
    let mut tally = SalesTally::default();
    let mut skipped = SkipCounts::default();
    let mut counted = 0usize;

    for deal in deals {
        let deal_id = deal.id.as_deref().unwrap_or("?");
        match evaluate_deal(&deal.properties, rules, period, names) {
            DealVerdict::Counted { short_name, amount } => {
                counted += 1;
                tally.add(short_name, amount);
            }
            DealVerdict::MissingField => skipped.missing += 1,
            DealVerdict::OtherStage => skipped.other_stage += 1,
            DealVerdict::UnparsableCloseDate(raw) => {
                warn!("Deal {}: cannot parse close date {:?}", deal_id, raw);
                skipped.bad_close_date += 1;
            }
            DealVerdict::OutsidePeriod => skipped.outside_period += 1,
            DealVerdict::UnparsableAmount(raw) => {
                warn!("Deal {}: cannot parse amount {:?}", deal_id, raw);
                skipped.bad_amount += 1;
            }
            DealVerdict::NotAllowListed(_) => skipped.not_allowed += 1,
        }
    }

    debug!(
        "Counted {} of {} deals for {}; skipped {:?}",
        counted,
        deals.len(),
        period,
        skipped
    );

    tally.into_rows()
}

/// Fetch all deals and compute the leaderboard for `period`.
///
/// The owner directory is loaded first (once per process). If it cannot be
/// loaded, every owner resolves to `"Unknown"` and nothing is counted.
pub async fn aggregate_sales(
    source: &dyn CrmSource,
    directory: &OwnerDirectory,
    rules: &SalesRules,
    period: ReportingPeriod,
) -> Fetched<Vec<SalesRow>> {
    let empty = OwnerNames::default();
    let names = match directory.names(source).await {
        Ok(names) => {
            if !names.is_complete() {
                debug!("Owner directory is partial; some deals may resolve to Unknown");
            }
            names
        }
        Err(e) => {
            warn!("Continuing without owner names: {}", e);
            &empty
        }
    };

    let page_limit = rules.page_limit;
    let deals = follow_cursor("deals", rules.deal_failure, move |after| async move {
        source.deals_page(page_limit, after.as_deref()).await
    })
    .await;

    let result = deals.map(|deals| tally_deals(&deals, rules, period, names));
    if let Some(rows) = result.data() {
        info!(
            "Aggregated {} sales rows for {} ({})",
            rows.len(),
            period,
            result.completeness()
        );
    }
    result
}
