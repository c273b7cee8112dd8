use std::fmt::{Display, Formatter};
use std::io::{BufReader, Read};
use std::path::Path;

use serde::{Deserialize, Serialize, Serializer};
use time::macros::format_description;
use time::Date;

use crate::DashboardError;

/// Header names of the columns the store reads, in export order.
pub const COLUMNS: [&str; 11] = [
    "Order ID",
    "Order Date",
    "Region",
    "Category",
    "Sub-Category",
    "Segment",
    "State",
    "Product Name",
    "Quantity",
    "Sales",
    "Profit",
];

/// Calendar month of an order date; sorts chronologically and renders as `YYYY-MM`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct MonthKey {
    year: i32,
    month: u8,
}

impl MonthKey {
    #[must_use]
    pub fn from_date(date: Date) -> Self {
        Self {
            year: date.year(),
            month: u8::from(date.month()),
        }
    }

    #[must_use]
    pub fn year(self) -> i32 {
        self.year
    }

    #[must_use]
    pub fn month(self) -> u8 {
        self.month
    }
}

impl Display for MonthKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl Serialize for MonthKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One sales transaction line.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Record {
    pub order_id: String,
    pub order_date: Date,
    pub region: String,
    pub category: String,
    pub sub_category: String,
    pub segment: String,
    pub state: String,
    pub product_name: String,
    pub quantity: u32,
    pub sales: f64,
    pub profit: f64,
    pub month: MonthKey,
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(rename = "Order ID")]
    order_id: String,
    #[serde(rename = "Order Date")]
    order_date: String,
    #[serde(rename = "Region")]
    region: String,
    #[serde(rename = "Category")]
    category: String,
    #[serde(rename = "Sub-Category")]
    sub_category: String,
    #[serde(rename = "Segment")]
    segment: String,
    #[serde(rename = "State")]
    state: String,
    #[serde(rename = "Product Name")]
    product_name: String,
    #[serde(rename = "Quantity")]
    quantity: u32,
    #[serde(rename = "Sales")]
    sales: f64,
    #[serde(rename = "Profit")]
    profit: f64,
}

/// Immutable, load-once table of sales records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordStore {
    records: Vec<Record>,
}

impl RecordStore {
    /// Reads and parses the CSV file at `path`.
    ///
    /// # Errors
    /// Returns [`DashboardError::NotFound`] when the file does not exist,
    /// [`DashboardError::InvalidDate`] for the first row whose order date does
    /// not parse, and [`DashboardError::Load`] for any other read or CSV
    /// failure, including text that is not valid UTF-8.
    pub fn load(path: &Path) -> Result<Self, DashboardError> {
        let file = match std::fs::File::open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(DashboardError::NotFound(path.display().to_string()));
            }
            Err(err) => {
                return Err(DashboardError::Load(format!(
                    "failed to read {}: {err}",
                    path.display()
                )));
            }
        };

        let store = Self::from_reader(BufReader::new(file))?;
        tracing::debug!(
            path = %path.display(),
            records = store.len(),
            "loaded record store"
        );
        Ok(store)
    }

    /// Parses records from any CSV source with a header row.
    ///
    /// # Errors
    /// Same taxonomy as [`RecordStore::load`], minus `NotFound`.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, DashboardError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = csv_reader
            .headers()
            .map_err(|err| csv_load_error("failed to read CSV header", &err))?
            .clone();

        let mut records = Vec::new();
        let mut row = csv::StringRecord::new();
        loop {
            match csv_reader.read_record(&mut row) {
                Ok(true) => {}
                Ok(false) => break,
                Err(err) => return Err(csv_load_error("invalid CSV row", &err)),
            }

            let line = row.position().map_or(0, csv::Position::line);
            let raw: RawRecord = row.deserialize(Some(&headers)).map_err(|err| {
                DashboardError::Load(format!("invalid record at line {line}: {err}"))
            })?;
            let Ok(order_date) = parse_order_date(&raw.order_date) else {
                return Err(DashboardError::InvalidDate {
                    line,
                    value: raw.order_date,
                });
            };

            records.push(Record {
                order_id: raw.order_id,
                order_date,
                region: raw.region,
                category: raw.category,
                sub_category: raw.sub_category,
                segment: raw.segment,
                state: raw.state,
                product_name: raw.product_name,
                quantity: raw.quantity,
                sales: raw.sales,
                profit: raw.profit,
                month: MonthKey::from_date(order_date),
            });
        }

        Ok(Self { records })
    }

    /// Builds a store from already-typed records. Month keys are recomputed
    /// from the order dates.
    #[must_use]
    pub fn from_records(mut records: Vec<Record>) -> Self {
        for record in &mut records {
            record.month = MonthKey::from_date(record.order_date);
        }
        Self { records }
    }

    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Earliest and latest order date, or `None` for an empty store.
    #[must_use]
    pub fn date_bounds(&self) -> Option<(Date, Date)> {
        let first = self.records.first()?.order_date;
        Some(self.records.iter().fold((first, first), |(min, max), record| {
            (min.min(record.order_date), max.max(record.order_date))
        }))
    }
}

fn csv_load_error(context: &str, err: &csv::Error) -> DashboardError {
    match err.kind() {
        csv::ErrorKind::Utf8 { pos, err: utf8 } => DashboardError::Load(format!(
            "invalid UTF-8 at line {}: {utf8}",
            pos.as_ref().map_or(0, csv::Position::line)
        )),
        _ => DashboardError::Load(format!("{context}: {err}")),
    }
}

/// Parses an order date in the dataset's `M/D/YYYY` form.
///
/// # Errors
/// Returns the underlying parse error when `value` is not a valid date in that form.
pub fn parse_order_date(value: &str) -> Result<Date, time::error::Parse> {
    Date::parse(
        value.trim(),
        format_description!("[month padding:none]/[day padding:none]/[year]"),
    )
}

/// Parses a date typed by a user: either `M/D/YYYY` or ISO `YYYY-MM-DD`.
///
/// # Errors
/// Returns [`DashboardError::Validation`] when neither form matches.
pub fn parse_filter_date(value: &str) -> Result<Date, DashboardError> {
    if let Ok(date) = parse_order_date(value) {
        return Ok(date);
    }
    Date::parse(value.trim(), format_description!("[year]-[month]-[day]")).map_err(|_| {
        DashboardError::Validation(format!(
            "invalid date {value:?}: expected MM/DD/YYYY or YYYY-MM-DD"
        ))
    })
}

/// Renders a date back into the dataset's `MM/DD/YYYY` form.
#[must_use]
pub fn format_order_date(date: Date) -> String {
    format!(
        "{:02}/{:02}/{:04}",
        u8::from(date.month()),
        date.day(),
        date.year()
    )
}
