//! Listing / export filter normalisation.
//!
//! Raw query parameters become a [`FilterSpec`] here: pagination defaults
//! are applied, the `field:direction` sort list is parsed against a fixed set
//! of sortable columns, and the date range is resolved. The db crate turns
//! a `FilterSpec` into SQL.

use chrono::{Duration, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::Timestamp;

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 1000;

/// Columns a client may sort by.
pub const SORTABLE_COLUMNS: &[&str] = &["id", "username", "email", "phone", "address", "created_at"];

/// Query parameters accepted by the list and export endpoints.
///
/// `sort` is a comma-separated list of `field:direction` tokens.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub all: bool,
    pub limit: Option<i64>,
    pub page: Option<i64>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub sort: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "asc" => Some(SortDirection::Asc),
            "desc" => Some(SortDirection::Desc),
            _ => None,
        }
    }
}

/// One `ORDER BY` term. `column` is always one of [`SORTABLE_COLUMNS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortClause {
    pub column: &'static str,
    pub direction: SortDirection,
}

/// Half-open creation-time window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: Timestamp,
    pub end: Timestamp,
}

/// Normalised filter for one listing or export query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSpec {
    pub username: Option<String>,
    pub email: Option<String>,
    pub created: Option<DateRange>,
    pub sort: Vec<SortClause>,
    pub page: i64,
    pub page_size: i64,
    pub all: bool,
}

impl Default for FilterSpec {
    fn default() -> Self {
        Self {
            username: None,
            email: None,
            created: None,
            sort: default_sort(),
            page: DEFAULT_PAGE,
            page_size: DEFAULT_PAGE_SIZE,
            all: false,
        }
    }
}

impl FilterSpec {
    /// Build a spec from raw parameters.
    ///
    /// Fails on a malformed date or a page whose offset does not fit in an
    /// `i64`. Unknown sort columns and non-positive page values fall back to
    /// defaults; `limit` is clamped to [`MAX_PAGE_SIZE`].
    pub fn from_params(params: &ListParams) -> Result<Self, CoreError> {
        let created = match (non_empty(&params.start_date), non_empty(&params.end_date)) {
            (Some(start), Some(end)) => Some(parse_date_range(&start, &end)?),
            _ => None,
        };

        let page = positive_or(params.page, DEFAULT_PAGE);
        let page_size = clamp_limit(params.limit, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE);
        if page_offset(page, page_size).is_none() {
            return Err(CoreError::Validation(format!("page {page} is out of range")));
        }

        Ok(Self {
            username: non_empty(&params.username),
            email: non_empty(&params.email),
            created,
            sort: params.sort.as_deref().map_or_else(default_sort, parse_sort),
            page,
            page_size,
            all: params.all,
        })
    }

    /// Row offset of the requested page, saturating at `i64::MAX`.
    pub fn offset(&self) -> i64 {
        page_offset(self.page, self.page_size).unwrap_or(i64::MAX)
    }
}

/// Page metadata returned alongside a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub page: i64,
    pub limit: i64,
    pub total_data: i64,
    pub total_page: i64,
}

impl PageMeta {
    pub fn new(spec: &FilterSpec, total: i64) -> Self {
        if spec.all {
            return Self {
                page: 1,
                limit: total,
                total_data: total,
                total_page: if total > 0 { 1 } else { 0 },
            };
        }
        Self {
            page: spec.page,
            limit: spec.page_size,
            total_data: total,
            total_page: total_pages(total, spec.page_size),
        }
    }
}

/// `ceil(total / page_size)`, and `0` for an empty result.
pub fn total_pages(total: i64, page_size: i64) -> i64 {
    if total <= 0 || page_size <= 0 {
        return 0;
    }
    total / page_size + i64::from(total % page_size != 0)
}

/// Parse `field:direction[,field:direction...]`.
///
/// Tokens without a direction, with an unknown column or with a direction
/// other than `asc`/`desc` are skipped. With nothing left the default
/// `id DESC` applies.
pub fn parse_sort(raw: &str) -> Vec<SortClause> {
    let clauses: Vec<SortClause> = raw
        .split(',')
        .filter_map(|token| {
            let (field, direction) = token.split_once(':')?;
            let field = field.trim();
            let column = SORTABLE_COLUMNS.iter().copied().find(|c| *c == field)?;
            Some(SortClause {
                column,
                direction: SortDirection::parse(direction)?,
            })
        })
        .collect();

    if clauses.is_empty() {
        default_sort()
    } else {
        clauses
    }
}

pub fn default_sort() -> Vec<SortClause> {
    vec![SortClause {
        column: "id",
        direction: SortDirection::Desc,
    }]
}

/// Resolve `YYYY-MM-DD` bounds into `[start 00:00, end+1 00:00)` UTC.
fn parse_date_range(start: &str, end: &str) -> Result<DateRange, CoreError> {
    let start = parse_day(start, "start_date")?;
    let end = parse_day(end, "end_date")?;
    Ok(DateRange {
        start: start.and_time(NaiveTime::MIN).and_utc(),
        end: (end + Duration::days(1)).and_time(NaiveTime::MIN).and_utc(),
    })
}

fn parse_day(raw: &str, name: &str) -> Result<NaiveDate, CoreError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        CoreError::Validation(format!("{name} value must be date (yyyy-mm-dd)"))
    })
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn positive_or(value: Option<i64>, default: i64) -> i64 {
    value.filter(|v| *v > 0).unwrap_or(default)
}

/// Non-positive limits fall back to `default`; larger ones are capped at `max`.
fn clamp_limit(limit: Option<i64>, default: i64, max: i64) -> i64 {
    positive_or(limit, default).min(max)
}

fn page_offset(page: i64, page_size: i64) -> Option<i64> {
    page.checked_sub(1)?.checked_mul(page_size)
}
