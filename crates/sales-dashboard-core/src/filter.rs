use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use time::Date;

use crate::{DashboardError, Record, RecordStore};

/// Categorical dimensions in the order the filters are applied.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Region,
    Category,
    SubCategory,
    Segment,
}

impl Dimension {
    pub const ALL: [Self; 4] = [Self::Region, Self::Category, Self::SubCategory, Self::Segment];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Region => "region",
            Self::Category => "category",
            Self::SubCategory => "sub_category",
            Self::Segment => "segment",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "region" => Some(Self::Region),
            "category" => Some(Self::Category),
            "sub_category" => Some(Self::SubCategory),
            "segment" => Some(Self::Segment),
            _ => None,
        }
    }

    /// Column header of the dimension in the source data.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Region => "Region",
            Self::Category => "Category",
            Self::SubCategory => "Sub-Category",
            Self::Segment => "Segment",
        }
    }

    #[must_use]
    pub fn value(self, record: &Record) -> &str {
        match self {
            Self::Region => &record.region,
            Self::Category => &record.category,
            Self::SubCategory => &record.sub_category,
            Self::Segment => &record.segment,
        }
    }
}

/// Inclusive order-date range.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
pub struct DateRange {
    pub start: Date,
    pub end: Date,
}

impl DateRange {
    /// # Errors
    /// Returns [`DashboardError::Validation`] when `start` is after `end`.
    pub fn new(start: Date, end: Date) -> Result<Self, DashboardError> {
        if start > end {
            return Err(DashboardError::Validation(format!(
                "date range start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    #[must_use]
    pub fn contains(&self, date: Date) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Concrete filter predicates. An empty set in any dimension matches nothing.
///
/// `date_range: None` leaves order dates unconstrained.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq, Hash)]
pub struct FilterSelection {
    pub date_range: Option<DateRange>,
    pub regions: BTreeSet<String>,
    pub categories: BTreeSet<String>,
    pub sub_categories: BTreeSet<String>,
    pub segments: BTreeSet<String>,
}

impl FilterSelection {
    /// Selects the full date span and every value of every dimension, so
    /// applying it keeps the whole store.
    #[must_use]
    pub fn all(store: &RecordStore) -> Self {
        let mut selection = Self {
            date_range: store
                .date_bounds()
                .map(|(start, end)| DateRange { start, end }),
            ..Self::default()
        };
        for record in store.records() {
            for dimension in Dimension::ALL {
                let values = selection.values_mut(dimension);
                if !values.contains(dimension.value(record)) {
                    values.insert(dimension.value(record).to_string());
                }
            }
        }
        selection
    }

    #[must_use]
    pub fn values(&self, dimension: Dimension) -> &BTreeSet<String> {
        match dimension {
            Dimension::Region => &self.regions,
            Dimension::Category => &self.categories,
            Dimension::SubCategory => &self.sub_categories,
            Dimension::Segment => &self.segments,
        }
    }

    pub fn values_mut(&mut self, dimension: Dimension) -> &mut BTreeSet<String> {
        match dimension {
            Dimension::Region => &mut self.regions,
            Dimension::Category => &mut self.categories,
            Dimension::SubCategory => &mut self.sub_categories,
            Dimension::Segment => &mut self.segments,
        }
    }

    #[must_use]
    pub fn date_matches(&self, record: &Record) -> bool {
        self.date_range
            .map_or(true, |range| range.contains(record.order_date))
    }

    /// True when `record` satisfies every predicate of the selection.
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        self.date_matches(record)
            && Dimension::ALL
                .iter()
                .all(|dimension| self.values(*dimension).contains(dimension.value(record)))
    }
}

/// Records of a store that pass a [`FilterSelection`], in store order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilteredView<'a> {
    records: Vec<&'a Record>,
}

impl<'a> FilteredView<'a> {
    #[must_use]
    pub fn new(records: Vec<&'a Record>) -> Self {
        Self { records }
    }

    #[must_use]
    pub fn records(&self) -> &[&'a Record] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a Record> + '_ {
        self.records.iter().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Narrows the store by date range, then region, category, sub-category and
/// segment membership.
#[must_use]
pub fn apply_filters<'a>(store: &'a RecordStore, selection: &FilterSelection) -> FilteredView<'a> {
    let mut candidates: Vec<&Record> = store
        .records()
        .iter()
        .filter(|record| selection.date_matches(record))
        .collect();

    for dimension in Dimension::ALL {
        if candidates.is_empty() {
            break;
        }
        let allowed = selection.values(dimension);
        candidates.retain(|record| allowed.contains(dimension.value(record)));
    }

    tracing::debug!(
        matched = candidates.len(),
        total = store.len(),
        "applied filter selection"
    );
    FilteredView::new(candidates)
}

/// Option lists offered for each filter, each derived from the records that
/// survived every earlier filter. Values are listed in first-seen order.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct FilterOptions {
    pub date_bounds: Option<DateRange>,
    pub regions: Vec<String>,
    pub categories: Vec<String>,
    pub sub_categories: Vec<String>,
    pub segments: Vec<String>,
}

impl FilterOptions {
    #[must_use]
    pub fn values(&self, dimension: Dimension) -> &[String] {
        match dimension {
            Dimension::Region => &self.regions,
            Dimension::Category => &self.categories,
            Dimension::SubCategory => &self.sub_categories,
            Dimension::Segment => &self.segments,
        }
    }

    fn values_mut(&mut self, dimension: Dimension) -> &mut Vec<String> {
        match dimension {
            Dimension::Region => &mut self.regions,
            Dimension::Category => &mut self.categories,
            Dimension::SubCategory => &mut self.sub_categories,
            Dimension::Segment => &mut self.segments,
        }
    }
}

/// A user's partial filter input.
///
/// Absent fields fall back to defaults: the store's date bounds and every
/// option still available for a dimension. A present empty list deselects
/// the whole dimension.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FilterRequest {
    #[serde(default)]
    pub from: Option<Date>,
    #[serde(default)]
    pub to: Option<Date>,
    #[serde(default)]
    pub regions: Option<Vec<String>>,
    #[serde(default)]
    pub categories: Option<Vec<String>>,
    #[serde(default)]
    pub sub_categories: Option<Vec<String>>,
    #[serde(default)]
    pub segments: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFilter {
    pub selection: FilterSelection,
    pub options: FilterOptions,
}

impl FilterRequest {
    /// Decodes a request from its JSON form (`from`/`to` as `YYYY-MM-DD`).
    ///
    /// # Errors
    /// Returns [`DashboardError::Validation`] when the JSON is malformed or
    /// carries unknown fields.
    pub fn from_json(value: &str) -> Result<Self, DashboardError> {
        serde_json::from_str(value).map_err(|err| {
            DashboardError::Validation(format!("invalid filter request JSON: {err}"))
        })
    }

    #[must_use]
    pub fn values(&self, dimension: Dimension) -> Option<&[String]> {
        match dimension {
            Dimension::Region => self.regions.as_deref(),
            Dimension::Category => self.categories.as_deref(),
            Dimension::SubCategory => self.sub_categories.as_deref(),
            Dimension::Segment => self.segments.as_deref(),
        }
    }

    pub fn set_values(&mut self, dimension: Dimension, values: Option<Vec<String>>) {
        match dimension {
            Dimension::Region => self.regions = values,
            Dimension::Category => self.categories = values,
            Dimension::SubCategory => self.sub_categories = values,
            Dimension::Segment => self.segments = values,
        }
    }

    /// Resolves defaults against `store`, cascading option lists through the
    /// filters in application order.
    ///
    /// An absent `from` or `to` defaults to the store's first or last order
    /// date. A lone `from` after the last order date, or a lone `to` before
    /// the first, therefore resolves to an inverted range and is rejected.
    ///
    /// # Errors
    /// Returns [`DashboardError::Validation`] when the resolved date range is
    /// inverted or a requested value is not among the options available at
    /// its stage.
    pub fn resolve(&self, store: &RecordStore) -> Result<ResolvedFilter, DashboardError> {
        let bounds = store
            .date_bounds()
            .map(|(start, end)| DateRange { start, end });
        let start = self.from.or(bounds.map(|range| range.start));
        let end = self.to.or(bounds.map(|range| range.end));
        let date_range = match (start, end) {
            (Some(start), Some(end)) => Some(DateRange::new(start, end)?),
            _ => None,
        };

        let mut selection = FilterSelection {
            date_range,
            ..FilterSelection::default()
        };
        let mut options = FilterOptions {
            date_bounds: bounds,
            ..FilterOptions::default()
        };

        let mut candidates: Vec<&Record> = store
            .records()
            .iter()
            .filter(|record| selection.date_matches(record))
            .collect();

        for dimension in Dimension::ALL {
            let available = distinct_in_order(&candidates, dimension);
            let chosen: BTreeSet<String> = match self.values(dimension) {
                None => available.iter().cloned().collect(),
                Some(requested) => {
                    if let Some(missing) = requested.iter().find(|value| !available.contains(value))
                    {
                        return Err(DashboardError::Validation(format!(
                            "{} {missing:?} is not available for the current selection",
                            dimension.label()
                        )));
                    }
                    requested.iter().cloned().collect()
                }
            };

            candidates.retain(|record| chosen.contains(dimension.value(record)));
            *options.values_mut(dimension) = available;
            *selection.values_mut(dimension) = chosen;
        }

        Ok(ResolvedFilter { selection, options })
    }
}

fn distinct_in_order(records: &[&Record], dimension: Dimension) -> Vec<String> {
    let mut seen = HashSet::new();
    records
        .iter()
        .map(|record| dimension.value(record))
        .filter(|value| seen.insert(*value))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MonthKey;
    use proptest::prelude::*;
    use time::Month;

    fn must_ok<T, E: std::fmt::Display>(result: Result<T, E>) -> T {
        match result {
            Ok(value) => value,
            Err(err) => panic!("expected Ok(..), got error: {err}"),
        }
    }

    fn fixture_record(
        order_id: &str,
        day: u8,
        region: &str,
        category: &str,
        sub_category: &str,
        segment: &str,
    ) -> Record {
        let order_date = must_ok(Date::from_calendar_date(2017, Month::March, day));
        Record {
            order_id: order_id.to_string(),
            order_date,
            region: region.to_string(),
            category: category.to_string(),
            sub_category: sub_category.to_string(),
            segment: segment.to_string(),
            state: "Texas".to_string(),
            product_name: format!("product-{order_id}"),
            quantity: 1,
            sales: 10.0,
            profit: 1.0,
            month: MonthKey::from_date(order_date),
        }
    }

    fn fixture_store() -> RecordStore {
        RecordStore::from_records(vec![
            fixture_record("A", 1, "East", "Technology", "Phones", "Consumer"),
            fixture_record("B", 5, "West", "Furniture", "Chairs", "Corporate"),
            fixture_record("C", 9, "East", "Furniture", "Tables", "Home Office"),
            fixture_record("D", 14, "Central", "Technology", "Copiers", "Consumer"),
        ])
    }

    fn date(day: u8) -> Date {
        must_ok(Date::from_calendar_date(2017, Month::March, day))
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn select_all_keeps_every_record() {
        let store = fixture_store();
        let view = apply_filters(&store, &FilterSelection::all(&store));
        assert_eq!(view.len(), store.len());
    }

    #[test]
    fn default_request_resolves_to_select_all() {
        let store = fixture_store();
        let resolved = must_ok(FilterRequest::default().resolve(&store));
        assert_eq!(resolved.selection, FilterSelection::all(&store));
        assert_eq!(resolved.options.regions, strings(&["East", "West", "Central"]));
        assert_eq!(
            resolved.options.date_bounds,
            Some(DateRange {
                start: date(1),
                end: date(14)
            })
        );
    }

    #[test]
    fn empty_dimension_selection_empties_the_view() {
        let store = fixture_store();
        let mut selection = FilterSelection::all(&store);
        selection.regions.clear();
        assert!(apply_filters(&store, &selection).is_empty());

        let request = FilterRequest {
            segments: Some(Vec::new()),
            ..FilterRequest::default()
        };
        let resolved = must_ok(request.resolve(&store));
        assert!(apply_filters(&store, &resolved.selection).is_empty());
    }

    #[test]
    fn date_range_is_inclusive() {
        let store = fixture_store();
        let request = FilterRequest {
            from: Some(date(5)),
            to: Some(date(9)),
            ..FilterRequest::default()
        };
        let resolved = must_ok(request.resolve(&store));
        let view = apply_filters(&store, &resolved.selection);
        let ids: Vec<&str> = view.iter().map(|record| record.order_id.as_str()).collect();
        assert_eq!(ids, vec!["B", "C"]);
    }

    #[test]
    fn option_lists_cascade_from_prior_filters() {
        let store = fixture_store();
        let request = FilterRequest {
            regions: Some(strings(&["East"])),
            categories: Some(strings(&["Furniture"])),
            ..FilterRequest::default()
        };
        let resolved = must_ok(request.resolve(&store));

        assert_eq!(resolved.options.regions, strings(&["East", "West", "Central"]));
        assert_eq!(resolved.options.categories, strings(&["Technology", "Furniture"]));
        assert_eq!(resolved.options.sub_categories, strings(&["Tables"]));
        assert_eq!(resolved.options.segments, strings(&["Home Office"]));

        let view = apply_filters(&store, &resolved.selection);
        assert_eq!(view.len(), 1);
        assert_eq!(view.records()[0].order_id, "C");
    }

    #[test]
    fn date_narrowing_shrinks_region_options() {
        let store = fixture_store();
        let request = FilterRequest {
            to: Some(date(5)),
            ..FilterRequest::default()
        };
        let resolved = must_ok(request.resolve(&store));
        assert_eq!(resolved.options.regions, strings(&["East", "West"]));
    }

    #[test]
    fn unavailable_value_is_a_validation_error() {
        let store = fixture_store();
        let request = FilterRequest {
            regions: Some(strings(&["West"])),
            sub_categories: Some(strings(&["Phones"])),
            ..FilterRequest::default()
        };
        match request.resolve(&store) {
            Err(DashboardError::Validation(message)) => {
                assert!(message.contains("Sub-Category \"Phones\""), "{message}");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn inverted_date_range_is_rejected() {
        let store = fixture_store();
        let request = FilterRequest {
            from: Some(date(9)),
            to: Some(date(1)),
            ..FilterRequest::default()
        };
        assert!(matches!(
            request.resolve(&store),
            Err(DashboardError::Validation(_))
        ));
    }

    #[test]
    fn open_ended_range_past_the_store_bounds_is_rejected() {
        let store = fixture_store();
        let late_from = FilterRequest {
            from: Some(date(20)),
            ..FilterRequest::default()
        };
        match late_from.resolve(&store) {
            Err(DashboardError::Validation(message)) => {
                assert!(message.contains("is after end 2017-03-14"), "{message}");
            }
            other => panic!("expected validation error, got {other:?}"),
        }

        let early_to = FilterRequest {
            to: Some(must_ok(Date::from_calendar_date(2017, Month::February, 1))),
            ..FilterRequest::default()
        };
        assert!(matches!(
            early_to.resolve(&store),
            Err(DashboardError::Validation(_))
        ));
    }

    #[test]
    fn empty_store_resolves_without_date_range() {
        let store = RecordStore::default();
        let resolved = must_ok(FilterRequest::default().resolve(&store));
        assert_eq!(resolved.selection.date_range, None);
        assert!(apply_filters(&store, &resolved.selection).is_empty());
    }

    #[test]
    fn request_json_uses_iso_dates_and_rejects_unknown_fields() {
        let request = must_ok(FilterRequest::from_json(
            r#"{"from":"2017-03-02","regions":["East"],"segments":[]}"#,
        ));
        assert_eq!(request.from, Some(date(2)));
        assert_eq!(request.to, None);
        assert_eq!(request.values(Dimension::Region), Some(&strings(&["East"])[..]));
        assert_eq!(request.values(Dimension::Segment), Some(&[][..]));
        assert_eq!(request.values(Dimension::Category), None);

        assert!(matches!(
            FilterRequest::from_json(r#"{"region":["East"]}"#),
            Err(DashboardError::Validation(_))
        ));
    }

    #[test]
    fn dimension_names_round_trip() {
        for dimension in Dimension::ALL {
            assert_eq!(Dimension::parse(dimension.as_str()), Some(dimension));
        }
        assert_eq!(Dimension::parse("state"), None);
    }

    fn arb_store() -> impl Strategy<Value = RecordStore> {
        let row = (
            0u8..6,
            1u8..=28,
            prop::sample::select(vec!["East", "West", "South"]),
            prop::sample::select(vec!["Furniture", "Technology"]),
            prop::sample::select(vec!["Chairs", "Phones", "Binders"]),
            prop::sample::select(vec!["Consumer", "Corporate"]),
        );
        prop::collection::vec(row, 0..40).prop_map(|rows| {
            RecordStore::from_records(
                rows.into_iter()
                    .map(|(order, day, region, category, sub_category, segment)| {
                        fixture_record(
                            &format!("O-{order}"),
                            day,
                            region,
                            category,
                            sub_category,
                            segment,
                        )
                    })
                    .collect(),
            )
        })
    }

    fn arb_selection() -> impl Strategy<Value = FilterSelection> {
        (
            1u8..=28,
            0u8..=27,
            prop::collection::btree_set(
                prop::sample::select(vec!["East", "West", "South"]).prop_map(String::from),
                0..=3,
            ),
            prop::collection::btree_set(
                prop::sample::select(vec!["Furniture", "Technology"]).prop_map(String::from),
                0..=2,
            ),
            prop::collection::btree_set(
                prop::sample::select(vec!["Chairs", "Phones", "Binders"]).prop_map(String::from),
                0..=3,
            ),
            prop::collection::btree_set(
                prop::sample::select(vec!["Consumer", "Corporate"]).prop_map(String::from),
                0..=2,
            ),
        )
            .prop_map(|(start, span, regions, categories, sub_categories, segments)| {
                let end = start.saturating_add(span).min(28);
                FilterSelection {
                    date_range: Some(DateRange {
                        start: date(start),
                        end: date(end),
                    }),
                    regions,
                    categories,
                    sub_categories,
                    segments,
                }
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_view_is_exactly_the_matching_records(store in arb_store(), selection in arb_selection()) {
            let view = apply_filters(&store, &selection);
            prop_assert!(view.iter().all(|record| selection.matches(record)));

            let expected: Vec<&Record> = store
                .records()
                .iter()
                .filter(|record| selection.matches(record))
                .collect();
            prop_assert_eq!(view.records(), &expected[..]);
        }
    }
}
