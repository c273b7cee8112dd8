#![allow(clippy::missing_errors_doc)]

//! Export surface of the dashboard: raw filtered rows as CSV and as an
//! `.xlsx` workbook, the text summary, and the aggregate views as JSON.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use sales_dashboard_core::{
    compute_views, format_order_date, render_summary, DashboardViews, FilteredView, Record,
    COLUMNS,
};
use serde::Serialize;

pub const RECORDS_FILE_NAME: &str = "filtered_superstore_data.csv";
pub const WORKBOOK_FILE_NAME: &str = "filtered_superstore_data.xlsx";
pub const WORKBOOK_SHEET_NAME: &str = "Sheet1";
pub const SUMMARY_FILE_NAME: &str = "superstore_summary.txt";
pub const VIEWS_FILE_NAME: &str = "dashboard_views.json";

#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    #[serde(rename = "Order ID")]
    order_id: &'a str,
    #[serde(rename = "Order Date")]
    order_date: String,
    #[serde(rename = "Region")]
    region: &'a str,
    #[serde(rename = "Category")]
    category: &'a str,
    #[serde(rename = "Sub-Category")]
    sub_category: &'a str,
    #[serde(rename = "Segment")]
    segment: &'a str,
    #[serde(rename = "State")]
    state: &'a str,
    #[serde(rename = "Product Name")]
    product_name: &'a str,
    #[serde(rename = "Quantity")]
    quantity: u32,
    #[serde(rename = "Sales")]
    sales: f64,
    #[serde(rename = "Profit")]
    profit: f64,
}

impl<'a> From<&'a Record> for ExportRow<'a> {
    fn from(record: &'a Record) -> Self {
        Self {
            order_id: &record.order_id,
            order_date: format_order_date(record.order_date),
            region: &record.region,
            category: &record.category,
            sub_category: &record.sub_category,
            segment: &record.segment,
            state: &record.state,
            product_name: &record.product_name,
            quantity: record.quantity,
            sales: record.sales,
            profit: record.profit,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ExportReport {
    pub records_path: PathBuf,
    pub workbook_path: PathBuf,
    pub summary_path: PathBuf,
    pub views_path: PathBuf,
    pub rows: usize,
}

/// Writes `records` as CSV with a header row, in the column layout the
/// record store loads.
pub fn write_records_csv<W: Write>(records: &[&Record], writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    if records.is_empty() {
        csv_writer
            .write_record(COLUMNS)
            .context("failed to write CSV header")?;
    }
    for record in records {
        csv_writer
            .serialize(ExportRow::from(*record))
            .with_context(|| format!("failed to write CSV row for order {}", record.order_id))?;
    }
    csv_writer.flush().context("failed to flush CSV output")?;
    Ok(())
}

/// Writes `records` to a single-sheet workbook at `path`: a header row of
/// [`COLUMNS`] followed by one row per record, with no index column.
pub fn write_records_xlsx(records: &[&Record], path: &Path) -> Result<()> {
    let mut book = umya_spreadsheet::new_file();
    let sheet = book
        .get_sheet_by_name_mut(WORKBOOK_SHEET_NAME)
        .ok_or_else(|| anyhow!("new workbook has no {WORKBOOK_SHEET_NAME}"))?;

    for (col, name) in (1u32..).zip(COLUMNS) {
        sheet.get_cell_mut((col, 1)).set_value(name);
    }
    for (row, record) in (2u32..).zip(records) {
        let text: [(u32, &str); 7] = [
            (1, record.order_id.as_str()),
            (3, record.region.as_str()),
            (4, record.category.as_str()),
            (5, record.sub_category.as_str()),
            (6, record.segment.as_str()),
            (7, record.state.as_str()),
            (8, record.product_name.as_str()),
        ];
        for (col, value) in text {
            sheet.get_cell_mut((col, row)).set_value(value);
        }
        sheet
            .get_cell_mut((2, row))
            .set_value(format_order_date(record.order_date));
        sheet
            .get_cell_mut((9, row))
            .set_value_number(f64::from(record.quantity));
        sheet.get_cell_mut((10, row)).set_value_number(record.sales);
        sheet.get_cell_mut((11, row)).set_value_number(record.profit);
    }

    umya_spreadsheet::writer::xlsx::write(&book, path)
        .map_err(|err| anyhow!("failed to write {}: {err}", path.display()))
}

pub fn write_views_json<W: Write>(views: &DashboardViews, mut writer: W) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, views).context("failed to encode views JSON")?;
    writeln!(writer).context("failed to write views JSON")?;
    writer.flush().context("failed to flush views JSON")?;
    Ok(())
}

/// Writes the raw rows (CSV and workbook), summary and views of `view` into `out_dir`.
///
/// Returns `Ok(None)` and writes nothing when the view is empty.
pub fn export_bundle(out_dir: &Path, view: &FilteredView<'_>) -> Result<Option<ExportReport>> {
    let Some(views) = compute_views(view) else {
        tracing::info!("nothing to export: filtered view is empty");
        return Ok(None);
    };

    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create export directory {}", out_dir.display()))?;

    let records_path = out_dir.join(RECORDS_FILE_NAME);
    write_records_csv(view.records(), create_file(&records_path)?)?;

    let workbook_path = out_dir.join(WORKBOOK_FILE_NAME);
    write_records_xlsx(view.records(), &workbook_path)?;

    let summary_path = out_dir.join(SUMMARY_FILE_NAME);
    let mut summary_file = create_file(&summary_path)?;
    summary_file
        .write_all(render_summary(&views.kpis).as_bytes())
        .with_context(|| format!("failed to write {}", summary_path.display()))?;
    summary_file
        .flush()
        .with_context(|| format!("failed to flush {}", summary_path.display()))?;

    let views_path = out_dir.join(VIEWS_FILE_NAME);
    write_views_json(&views, create_file(&views_path)?)?;

    tracing::info!(
        out_dir = %out_dir.display(),
        rows = view.len(),
        "exported filtered data"
    );
    Ok(Some(ExportReport {
        records_path,
        workbook_path,
        summary_path,
        views_path,
        rows: view.len(),
    }))
}

fn create_file(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sales_dashboard_core::{apply_filters, FilterSelection, RecordStore};

    const FIXTURE: &str = "\
Order ID,Order Date,Region,Category,Sub-Category,Segment,State,Product Name,Quantity,Sales,Profit
A,1/3/2017,East,Technology,Phones,Consumer,New York,\"Phone, Cordless\",2,1100.5,110.25
B,2/13/2017,West,Furniture,Chairs,Corporate,Oregon,Chair,1,200,-20
";

    fn must<T>(result: Result<T>) -> T {
        match result {
            Ok(value) => value,
            Err(err) => panic!("test failure: {err}"),
        }
    }

    fn fixture_store() -> RecordStore {
        match RecordStore::from_reader(FIXTURE.as_bytes()) {
            Ok(store) => store,
            Err(err) => panic!("fixture store failed to load: {err}"),
        }
    }

    fn temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "sales-dashboard-export-{name}-{}",
            std::process::id()
        ))
    }

    #[test]
    fn csv_export_reloads_into_the_same_records() {
        let store = fixture_store();
        let view = apply_filters(&store, &FilterSelection::all(&store));

        let mut buffer = Vec::new();
        must(write_records_csv(view.records(), &mut buffer));
        let text = String::from_utf8_lossy(&buffer).to_string();
        assert!(text.starts_with(
            "Order ID,Order Date,Region,Category,Sub-Category,Segment,State,Product Name,Quantity,Sales,Profit\n"
        ));
        assert!(text.contains("A,01/03/2017,East,Technology,Phones,Consumer,New York,\"Phone, Cordless\",2,1100.5,110.25\n"));

        let reloaded = match RecordStore::from_reader(buffer.as_slice()) {
            Ok(value) => value,
            Err(err) => panic!("exported CSV failed to reload: {err}"),
        };
        assert_eq!(reloaded, store);
    }

    #[test]
    fn csv_export_of_no_rows_still_has_header() {
        let mut buffer = Vec::new();
        must(write_records_csv(&[], &mut buffer));
        assert_eq!(
            String::from_utf8_lossy(&buffer),
            "Order ID,Order Date,Region,Category,Sub-Category,Segment,State,Product Name,Quantity,Sales,Profit\n"
        );
    }

    #[test]
    fn workbook_export_reads_back_with_header_and_rows() {
        let store = fixture_store();
        let view = apply_filters(&store, &FilterSelection::all(&store));
        let out_dir = temp_dir("workbook");
        must(std::fs::create_dir_all(&out_dir).map_err(Into::into));
        let path = out_dir.join(WORKBOOK_FILE_NAME);

        must(write_records_xlsx(view.records(), &path));

        let book = must(
            umya_spreadsheet::reader::xlsx::read(&path).map_err(|err| anyhow!("{err}")),
        );
        let Some(sheet) = book.get_sheet_by_name(WORKBOOK_SHEET_NAME) else {
            panic!("workbook is missing {WORKBOOK_SHEET_NAME}");
        };
        let header: Vec<String> = (1u32..=11).map(|col| sheet.get_value((col, 1))).collect();
        assert_eq!(header, COLUMNS);
        assert_eq!(sheet.get_value((12, 1)), "");

        assert_eq!(sheet.get_value((1, 2)), "A");
        assert_eq!(sheet.get_value((2, 2)), "01/03/2017");
        assert_eq!(sheet.get_value((8, 2)), "Phone, Cordless");
        assert_eq!(sheet.get_value((9, 2)), "2");
        assert_eq!(sheet.get_value((10, 2)), "1100.5");
        assert_eq!(sheet.get_value((1, 3)), "B");
        assert_eq!(sheet.get_value((11, 3)), "-20");
        assert_eq!(sheet.get_value((1, 4)), "");

        let _ = std::fs::remove_dir_all(&out_dir);
    }

    #[test]
    fn bundle_writes_all_export_files() {
        let store = fixture_store();
        let view = apply_filters(&store, &FilterSelection::all(&store));
        let out_dir = temp_dir("bundle");

        let report = match must(export_bundle(&out_dir, &view)) {
            Some(value) => value,
            None => panic!("expected an export report"),
        };
        assert_eq!(report.rows, 2);
        assert_eq!(report.records_path, out_dir.join(RECORDS_FILE_NAME));
        assert_eq!(report.workbook_path, out_dir.join(WORKBOOK_FILE_NAME));
        assert!(report.workbook_path.exists());

        let summary = must(std::fs::read_to_string(&report.summary_path).map_err(Into::into));
        assert_eq!(
            summary,
            "Sales Summary:\nTotal Sales: $1,300.50\nTotal Profit: $90.25\nNumber of Orders: 2\n"
        );

        let views_body = must(std::fs::read_to_string(&report.views_path).map_err(Into::into));
        let views: serde_json::Value = must(serde_json::from_str(&views_body).map_err(Into::into));
        assert_eq!(views["kpis"]["distinct_orders"], 2);
        assert_eq!(views["time_series"][0]["month"], "2017-01");
        assert_eq!(views["geo"]["rows"][0]["code"], "NY");

        let _ = std::fs::remove_dir_all(&out_dir);
    }

    #[test]
    fn bundle_skips_empty_views() {
        let store = fixture_store();
        let mut selection = FilterSelection::all(&store);
        selection.segments.clear();
        let view = apply_filters(&store, &selection);
        let out_dir = temp_dir("empty");

        assert_eq!(must(export_bundle(&out_dir, &view)), None);
        assert!(!out_dir.join(RECORDS_FILE_NAME).exists());
        assert!(!out_dir.join(WORKBOOK_FILE_NAME).exists());
    }
}
