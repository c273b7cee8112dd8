//! Filter-and-aggregate pipeline behind the Superstore sales dashboard.
//!
//! The pipeline is a chain of pure steps over an immutable [`RecordStore`]:
//! - [`RecordStore::load`] parses the sales CSV once at startup.
//! - [`FilterRequest::resolve`] turns a (possibly partial) user selection into a
//!   concrete [`FilterSelection`] plus the cascaded [`FilterOptions`].
//! - [`apply_filters`] narrows the store to a [`FilteredView`].
//! - [`compute_views`] derives every [`DashboardViews`] aggregate, or `None`
//!   when the view is empty.

mod aggregate;
mod cache;
mod filter;
mod format;
mod geo;
mod record;

pub use aggregate::{
    category_breakdown, compute_kpis, compute_views, distinct_order_count, geo_breakdown,
    monthly_time_series, region_breakdown, region_category_cross_tab, top_product, total_profit,
    total_sales, CategoryRow, CrossTab, DashboardViews, GeoBreakdown, Kpis, MonthlyPoint,
    RegionRow, StateRow, TopProduct,
};
pub use cache::{CacheStats, ViewCache};
pub use filter::{
    apply_filters, DateRange, Dimension, FilterOptions, FilterRequest, FilterSelection,
    FilteredView, ResolvedFilter,
};
pub use format::{format_count, format_currency, render_summary};
pub use geo::{state_code, STATE_CODES};
pub use record::{
    format_order_date, parse_filter_date, parse_order_date, MonthKey, Record, RecordStore,
    COLUMNS,
};

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum DashboardError {
    #[error("data file not found: {0}")]
    NotFound(String),
    #[error("load error: {0}")]
    Load(String),
    #[error("invalid order date at line {line}: {value:?}")]
    InvalidDate { line: u64, value: String },
    #[error("validation error: {0}")]
    Validation(String),
}
