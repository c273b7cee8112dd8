use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::{state_code, FilteredView, MonthKey};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TopProduct {
    pub product_name: String,
    pub quantity: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Kpis {
    pub total_sales: f64,
    pub total_profit: f64,
    pub distinct_orders: usize,
    pub top_product: TopProduct,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MonthlyPoint {
    pub month: MonthKey,
    pub sales: f64,
    pub profit: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RegionRow {
    pub region: String,
    pub sales: f64,
    pub profit: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CategoryRow {
    pub category: String,
    pub sales: f64,
    /// Fraction of the view's total sales, in `[0, 1]` for non-negative sales.
    pub share: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StateRow {
    pub state: String,
    pub code: &'static str,
    pub sales: f64,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct GeoBreakdown {
    pub rows: Vec<StateRow>,
    /// State names dropped because they have no postal code.
    pub unmapped_states: Vec<String>,
}

/// Dense region by category grid of summed sales.
///
/// `cells[r][c]` holds the sales of `regions[r]` in `categories[c]`; pairs
/// with no records hold `0.0`.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct CrossTab {
    pub regions: Vec<String>,
    pub categories: Vec<String>,
    pub cells: Vec<Vec<f64>>,
}

impl CrossTab {
    #[must_use]
    pub fn get(&self, region: &str, category: &str) -> Option<f64> {
        let row = self.regions.iter().position(|value| value == region)?;
        let column = self.categories.iter().position(|value| value == category)?;
        self.cells.get(row)?.get(column).copied()
    }
}

/// Every aggregate the dashboard renders for one filter selection.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DashboardViews {
    pub kpis: Kpis,
    pub time_series: Vec<MonthlyPoint>,
    pub regions: Vec<RegionRow>,
    pub categories: Vec<CategoryRow>,
    pub geo: GeoBreakdown,
    pub cross_tab: CrossTab,
}

#[must_use]
pub fn total_sales(view: &FilteredView<'_>) -> f64 {
    view.iter().map(|record| record.sales).sum()
}

#[must_use]
pub fn total_profit(view: &FilteredView<'_>) -> f64 {
    view.iter().map(|record| record.profit).sum()
}

/// Number of unique order identifiers; never more than the view's length.
#[must_use]
pub fn distinct_order_count(view: &FilteredView<'_>) -> usize {
    view.iter()
        .map(|record| record.order_id.as_str())
        .collect::<HashSet<_>>()
        .len()
}

/// Product with the largest summed quantity. Ties go to the lexicographically
/// smallest product name.
#[must_use]
pub fn top_product(view: &FilteredView<'_>) -> Option<TopProduct> {
    let mut quantities: BTreeMap<&str, u64> = BTreeMap::new();
    for record in view.iter() {
        *quantities.entry(record.product_name.as_str()).or_default() += u64::from(record.quantity);
    }

    let mut best: Option<(&str, u64)> = None;
    for (name, quantity) in quantities {
        if best.map_or(true, |(_, top)| quantity > top) {
            best = Some((name, quantity));
        }
    }

    best.map(|(name, quantity)| TopProduct {
        product_name: name.to_string(),
        quantity,
    })
}

/// Monthly sales and profit, ascending by month with one row per month.
#[must_use]
pub fn monthly_time_series(view: &FilteredView<'_>) -> Vec<MonthlyPoint> {
    let mut months: BTreeMap<MonthKey, (f64, f64)> = BTreeMap::new();
    for record in view.iter() {
        let entry = months.entry(record.month).or_default();
        entry.0 += record.sales;
        entry.1 += record.profit;
    }
    months
        .into_iter()
        .map(|(month, (sales, profit))| MonthlyPoint {
            month,
            sales,
            profit,
        })
        .collect()
}

#[must_use]
pub fn region_breakdown(view: &FilteredView<'_>) -> Vec<RegionRow> {
    let mut regions: BTreeMap<&str, (f64, f64)> = BTreeMap::new();
    for record in view.iter() {
        let entry = regions.entry(record.region.as_str()).or_default();
        entry.0 += record.sales;
        entry.1 += record.profit;
    }
    regions
        .into_iter()
        .map(|(region, (sales, profit))| RegionRow {
            region: region.to_string(),
            sales,
            profit,
        })
        .collect()
}

#[must_use]
pub fn category_breakdown(view: &FilteredView<'_>) -> Vec<CategoryRow> {
    let mut categories: BTreeMap<&str, f64> = BTreeMap::new();
    for record in view.iter() {
        *categories.entry(record.category.as_str()).or_default() += record.sales;
    }
    let total: f64 = categories.values().sum();
    categories
        .into_iter()
        .map(|(category, sales)| CategoryRow {
            category: category.to_string(),
            sales,
            share: if total == 0.0 { 0.0 } else { sales / total },
        })
        .collect()
}

/// Sales per state keyed by postal code. States missing from the code table
/// are left out of `rows` and listed in `unmapped_states`.
#[must_use]
pub fn geo_breakdown(view: &FilteredView<'_>) -> GeoBreakdown {
    let mut states: BTreeMap<&str, f64> = BTreeMap::new();
    for record in view.iter() {
        *states.entry(record.state.as_str()).or_default() += record.sales;
    }

    let mut breakdown = GeoBreakdown::default();
    for (state, sales) in states {
        if let Some(code) = state_code(state) {
            breakdown.rows.push(StateRow {
                state: state.to_string(),
                code,
                sales,
            });
        } else {
            tracing::warn!(state, sales, "state has no postal code; dropped from geo breakdown");
            breakdown.unmapped_states.push(state.to_string());
        }
    }
    breakdown
}

#[must_use]
pub fn region_category_cross_tab(view: &FilteredView<'_>) -> CrossTab {
    let mut sums: BTreeMap<(&str, &str), f64> = BTreeMap::new();
    let mut regions: BTreeMap<&str, usize> = BTreeMap::new();
    let mut categories: BTreeMap<&str, usize> = BTreeMap::new();
    for record in view.iter() {
        *sums
            .entry((record.region.as_str(), record.category.as_str()))
            .or_default() += record.sales;
        regions.insert(record.region.as_str(), 0);
        categories.insert(record.category.as_str(), 0);
    }

    for (index, slot) in regions.values_mut().enumerate() {
        *slot = index;
    }
    for (index, slot) in categories.values_mut().enumerate() {
        *slot = index;
    }

    let mut cells = vec![vec![0.0; categories.len()]; regions.len()];
    for ((region, category), sales) in sums {
        cells[regions[region]][categories[category]] = sales;
    }

    CrossTab {
        regions: regions.keys().map(ToString::to_string).collect(),
        categories: categories.keys().map(ToString::to_string).collect(),
        cells,
    }
}

/// KPI set of the view; `None` when the view is empty.
#[must_use]
pub fn compute_kpis(view: &FilteredView<'_>) -> Option<Kpis> {
    let top_product = top_product(view)?;
    Some(Kpis {
        total_sales: total_sales(view),
        total_profit: total_profit(view),
        distinct_orders: distinct_order_count(view),
        top_product,
    })
}

/// Computes every aggregate, or reports no data for an empty view without
/// evaluating any of them.
#[must_use]
pub fn compute_views(view: &FilteredView<'_>) -> Option<DashboardViews> {
    if view.is_empty() {
        tracing::debug!("filtered view is empty; no aggregates available");
        return None;
    }

    Some(DashboardViews {
        kpis: compute_kpis(view)?,
        time_series: monthly_time_series(view),
        regions: region_breakdown(view),
        categories: category_breakdown(view),
        geo: geo_breakdown(view),
        cross_tab: region_category_cross_tab(view),
    })
}
