//! Markdown rendering of query results

use tracing::debug;

use crate::domain::{QueryResult, Value};

fn is_percent_column(column: &str) -> bool {
    let column = column.to_lowercase();
    column.contains("pct") || column.contains("percent")
}

fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Format one cell for display
///
/// Integers get thousands separators, reals two decimals, and reals in
/// percentage columns are shown as percentages.
pub fn format_cell(value: &Value, column: &str) -> String {
    match value {
        Value::Null => String::new(),
        Value::Integer(i) => group_thousands(*i),
        Value::Real(r) if is_percent_column(column) => format!("{:.1}%", r * 100.0),
        Value::Real(r) => format!("{:.2}", r),
        Value::Text(s) => s.clone(),
        Value::Blob(b) => format!("<{} bytes>", b.len()),
    }
}

/// Render at most `max_rows` rows as a Markdown table
pub fn markdown_table(result: &QueryResult, max_rows: usize) -> String {
    debug!(rows = result.row_count(), max_rows, "markdown_table: called");
    let mut lines = Vec::with_capacity(result.row_count().min(max_rows) + 3);
    lines.push(format!("| {} |", result.columns.join(" | ")));
    lines.push(format!("| {} |", vec!["---"; result.columns.len()].join(" | ")));

    for row in result.rows.iter().take(max_rows) {
        let cells = row
            .iter()
            .zip(&result.columns)
            .map(|(value, column)| format_cell(value, column))
            .collect::<Vec<_>>();
        lines.push(format!("| {} |", cells.join(" | ")));
    }

    if result.row_count() > max_rows {
        lines.push(format!("_…plus {} more rows_", result.row_count() - max_rows));
    }
    lines.join("\n")
}

/// One-line answer for a single-row result, if it has one
pub fn scalar_sentence(result: &QueryResult) -> Option<String> {
    if result.row_count() != 1 {
        return None;
    }
    if let Some(count) = result.get(0, "app_count").and_then(Value::as_i64) {
        return Some(format!("We currently track *{}* apps.", count));
    }
    match (result.columns.as_slice(), result.rows[0].as_slice()) {
        ([column], [value]) => Some(format!("*{}*: {}", column, format_cell(value, column))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_format_cell() {
        assert_eq!(format_cell(&Value::Integer(1234), "installs"), "1,234");
        assert_eq!(format_cell(&Value::Integer(1234567), "installs"), "1,234,567");
        assert_eq!(format_cell(&Value::Integer(-1234), "delta"), "-1,234");
        assert_eq!(format_cell(&Value::Integer(999), "installs"), "999");
        assert_eq!(format_cell(&Value::Real(12.346), "revenue"), "12.35");
        assert_eq!(format_cell(&Value::Real(0.1234), "pct_change"), "12.3%");
        assert_eq!(format_cell(&Value::Real(-0.5), "Percent"), "-50.0%");
        assert_eq!(format_cell(&Value::Null, "pct_change"), "");
        assert_eq!(format_cell(&Value::Text("US".to_string()), "country"), "US");
    }

    #[test]
    fn test_markdown_table() {
        let result = QueryResult::new(
            columns(&["country", "total_revenue"]),
            vec![
                vec![Value::Text("US".to_string()), Value::Real(1500.0)],
                vec![Value::Text("GB".to_string()), Value::Real(99.999)],
            ],
        );
        assert_eq!(
            markdown_table(&result, 10),
            "| country | total_revenue |\n| --- | --- |\n| US | 1500.00 |\n| GB | 100.00 |"
        );
    }

    #[test]
    fn test_markdown_table_truncates() {
        let rows = (0..13).map(|i| vec![Value::Integer(i)]).collect();
        let table = markdown_table(&QueryResult::new(columns(&["n"]), rows), 10);
        let lines: Vec<_> = table.lines().collect();
        assert_eq!(lines.len(), 2 + 10 + 1);
        assert_eq!(lines[11], "| 9 |");
        assert_eq!(lines[12], "_…plus 3 more rows_");
    }

    #[test]
    fn test_markdown_table_empty() {
        let table = markdown_table(&QueryResult::new(columns(&["a", "b"]), vec![]), 10);
        assert_eq!(table, "| a | b |\n| --- | --- |");
    }

    #[test]
    fn test_scalar_sentence_app_count() {
        let result = QueryResult::new(columns(&["app_count"]), vec![vec![Value::Integer(7)]]);
        assert_eq!(scalar_sentence(&result).as_deref(), Some("We currently track *7* apps."));
    }

    #[test]
    fn test_scalar_sentence_other_column() {
        let result = QueryResult::new(columns(&["total_installs"]), vec![vec![Value::Integer(12000)]]);
        assert_eq!(scalar_sentence(&result).as_deref(), Some("*total_installs*: 12,000"));
    }

    #[test]
    fn test_scalar_sentence_needs_one_row() {
        let result = QueryResult::new(columns(&["app_count"]), vec![]);
        assert!(scalar_sentence(&result).is_none());

        let wide = QueryResult::new(
            columns(&["a", "b"]),
            vec![vec![Value::Integer(1), Value::Integer(2)]],
        );
        assert!(scalar_sentence(&wide).is_none());
    }
}
