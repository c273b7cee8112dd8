use crate::Kpis;

/// Formats a monetary amount as `$1,234.57`; negatives render as `$-1,234.57`.
#[must_use]
pub fn format_currency(value: f64) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    let formatted = format!("{:.2}", value.abs());
    match formatted.split_once('.') {
        Some((whole, fraction)) => format!("${sign}{}.{fraction}", group_thousands(whole)),
        None => format!("${sign}{formatted}"),
    }
}

/// Formats a count with thousands separators.
#[must_use]
pub fn format_count(value: usize) -> String {
    group_thousands(&value.to_string())
}

/// Text summary offered for download alongside the raw data export.
#[must_use]
pub fn render_summary(kpis: &Kpis) -> String {
    format!(
        "Sales Summary:\nTotal Sales: {}\nTotal Profit: {}\nNumber of Orders: {}\n",
        format_currency(kpis.total_sales),
        format_currency(kpis.total_profit),
        format_count(kpis.distinct_orders),
    )
}

fn group_thousands(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    grouped
}
