//! LaTeX comparison tables
//!
//! One `table` environment per field, one row per benchmark and one column
//! per mode. The best (smallest) measurement in each row is set in bold,
//! failed attempts print as `*` and missing data as `-`.

use crate::error::{HarnessError, Result};
use crate::harness::{Field, Measurement, MetricValue, Mode, ResultTable};

/// Render a table for every field that all benchmarks carry
pub fn render_tables(results: &ResultTable, modes: &[Mode]) -> Result<Vec<String>> {
    if results.is_empty() {
        return Err(HarnessError::NoResults);
    }
    Ok(Field::ALL
        .iter()
        .filter_map(|field| build_table(results, *field, modes))
        .collect())
}

/// Table for one field, or `None` if some benchmark never recorded it
pub fn build_table(results: &ResultTable, field: Field, modes: &[Mode]) -> Option<String> {
    if !results.benchmarks().all(|b| results.has_field(b, field)) {
        return None;
    }

    let columns = modes.iter().map(|m| m.label()).collect::<Vec<_>>().join(" & ");
    let alignments = format!("l{}", "r".repeat(modes.len()));

    let mut rows = Vec::new();
    for bench in results.benchmarks() {
        let values: Vec<MetricValue> = modes.iter().map(|m| results.get(bench, field, *m)).collect();
        let best = row_minimum(&values);

        let mut cells = vec![format!("\\textsc{{{}}}", escape(stem(bench)))];
        cells.extend(values.iter().map(|v| render_cell(*v, field, best)));
        rows.push(format!("{} \\\\", cells.join(" & ")));
    }

    let caption = format!("{} Results", capitalize(field.name()));
    Some(format!(
        "\\begin{{table}}[h]\n\
         \\caption{{{caption}}}\n\
         \\begin{{tabular}}{{{alignments}}}\n\
         \\toprule\n\
         Benchmarks & {columns} \\\\\n\
         \\midrule\n\
         {rows}\n\
         \\bottomrule\n\
         \\end{{tabular}}\n\
         \\end{{table}}",
        rows = rows.join("\n"),
    ))
}

/// Smallest real measurement in a row; failures never compete
fn row_minimum(values: &[MetricValue]) -> Option<f64> {
    values
        .iter()
        .filter_map(MetricValue::measurement)
        .map(Measurement::as_f64)
        .min_by(|a, b| a.total_cmp(b))
}

fn render_cell(value: MetricValue, field: Field, best: Option<f64>) -> String {
    let measurement = match value {
        MetricValue::Unset => return "-".to_string(),
        MetricValue::Failed => return "*".to_string(),
        MetricValue::Measured(m) => m,
    };

    let text = match (field, measurement) {
        (Field::Time, m) => format!("{:.2}", m.as_f64()),
        (_, Measurement::Count(c)) => group_thousands(&c.to_string()),
        (_, Measurement::Seconds(s)) => {
            let formatted = format!("{:.2}", s);
            let (int, frac) = formatted.split_once('.').unwrap_or((formatted.as_str(), ""));
            format!("{}.{}", group_thousands(int), frac)
        }
    };

    let is_best = best.is_some_and(|b| round2(b) == round2(measurement.as_f64()));
    if is_best {
        format!("\\textbf{{{}}}", text)
    } else {
        text
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn stem(file_name: &str) -> &str {
    file_name.split('.').next().unwrap_or(file_name)
}

fn escape(s: &str) -> String {
    s.replace('_', "\\_")
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_with(values: &[(&str, Field, Mode, MetricValue)]) -> ResultTable {
        let mut table = ResultTable::new();
        for (bench, field, mode, value) in values {
            table.set(bench, *field, *mode, *value);
        }
        table
    }

    #[test]
    fn test_smallest_value_is_bold() {
        let table = table_with(&[
            ("c.dice", Field::Size, Mode::Det, MetricValue::count(10)),
            ("c.dice", Field::Size, Mode::Fh, MetricValue::count(8)),
        ]);
        let out = build_table(&table, Field::Size, &[Mode::Det, Mode::Fh]).unwrap();
        assert!(out.contains("\\textsc{c} & 10 & \\textbf{8} \\\\"));
        assert!(out.contains("\\caption{Size Results}"));
        assert!(out.contains("\\begin{tabular}{lrr}"));
        assert!(out.contains("Benchmarks & Det & FH \\\\"));
    }

    #[test]
    fn test_failed_and_unset_markers() {
        let table = table_with(&[
            ("d_e.dice", Field::Calls, Mode::Det, MetricValue::Failed),
            ("d_e.dice", Field::Calls, Mode::Fh, MetricValue::count(1_234_567)),
        ]);
        let out = build_table(&table, Field::Calls, &[Mode::Det, Mode::Fh, Mode::Ea]).unwrap();
        assert!(out.contains("\\textsc{d\\_e} & * & \\textbf{1,234,567} & - \\\\"));
    }

    #[test]
    fn test_failure_never_wins_row() {
        let values = [MetricValue::Failed, MetricValue::count(5), MetricValue::Unset];
        assert_eq!(row_minimum(&values), Some(5.0));
        assert_eq!(row_minimum(&[MetricValue::Failed]), None);
    }

    #[test]
    fn test_time_formatting_and_ties() {
        let table = table_with(&[
            ("t.dice", Field::Time, Mode::Det, MetricValue::seconds(1.2341)),
            ("t.dice", Field::Time, Mode::Fh, MetricValue::seconds(1.2349)),
            ("t.dice", Field::Time, Mode::Ea, MetricValue::seconds(3.5)),
        ]);
        let out = build_table(&table, Field::Time, &[Mode::Det, Mode::Fh, Mode::Ea]).unwrap();
        assert!(out.contains("\\textbf{1.23} & 3.50"));
        assert!(out.contains("\\textsc{t} & \\textbf{1.23} & "));
    }

    #[test]
    fn test_field_missing_from_a_benchmark_skips_table() {
        let table = table_with(&[
            ("a.dice", Field::Size, Mode::Det, MetricValue::count(1)),
            ("b.dice", Field::Time, Mode::Det, MetricValue::seconds(1.0)),
        ]);
        assert!(build_table(&table, Field::Size, &[Mode::Det]).is_none());
        assert!(render_tables(&table, &[Mode::Det]).unwrap().is_empty());
    }

    #[test]
    fn test_empty_store_is_error() {
        let err = render_tables(&ResultTable::new(), &Mode::ALL).unwrap_err();
        assert!(matches!(err, HarnessError::NoResults));
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands("0"), "0");
        assert_eq!(group_thousands("999"), "999");
        assert_eq!(group_thousands("1000"), "1,000");
        assert_eq!(group_thousands("12345678"), "12,345,678");
    }

    #[test]
    fn test_zero_is_real_data() {
        let table = table_with(&[
            ("z.dice", Field::Flips, Mode::Det, MetricValue::count(0)),
            ("z.dice", Field::Flips, Mode::Fh, MetricValue::count(4)),
        ]);
        let out = build_table(&table, Field::Flips, &[Mode::Det, Mode::Fh]).unwrap();
        assert!(out.contains("\\textbf{0} & 4 \\\\"));
    }
}
