//! Tab-separated table parsing.
//!
//! OCR output is split into trimmed, non-empty lines and each line into cells
//! on tabs. Ragged rows are kept as-is; the mapper decides what to do with
//! missing or surplus cells.

use crate::types::TabularData;

const DELIMITER: char = '\t';

/// Parse delimited OCR text into headers and rows
///
/// With `has_header` the first line names the columns. Without it, headers
/// `Col1..ColN` are synthesized from the first line's width and every line is
/// data. Empty input gives an empty table.
pub fn parse_table(text: &str, has_header: bool) -> TabularData {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let Some(first) = lines.first() else {
        return TabularData::default();
    };

    if has_header {
        TabularData {
            headers: split_cells(first),
            rows: lines[1..].iter().map(|line| split_cells(line)).collect(),
        }
    } else {
        let width = split_cells(first).len();
        TabularData {
            headers: (1..=width).map(|i| format!("Col{}", i)).collect(),
            rows: lines.iter().map(|line| split_cells(line)).collect(),
        }
    }
}

fn split_cells(line: &str) -> Vec<String> {
    line.split(DELIMITER).map(str::to_string).collect()
}

/// Render the table as CSV (header first), quoting cells that need it
pub fn to_csv(table: &TabularData) -> String {
    std::iter::once(&table.headers)
        .chain(table.rows.iter())
        .map(|row| row.iter().map(|cell| csv_escape(cell)).collect::<Vec<_>>().join(","))
        .collect::<Vec<_>>()
        .join("\n")
}

fn csv_escape(value: &str) -> String {
    if value.contains(['"', ',', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert_eq!(parse_table("", true), TabularData::default());
        assert_eq!(parse_table("  \n\n \t\n", true).rows.len(), 0);
    }

    #[test]
    fn test_header_and_row() {
        let table = parse_table("Player\tWeek\nBaker Mayfield\t1", true);
        assert_eq!(table.headers, vec!["Player", "Week"]);
        assert_eq!(table.rows, vec![vec!["Baker Mayfield", "1"]]);
    }

    #[test]
    fn test_blank_lines_and_padding_are_dropped() {
        let text = "\n  Player\tWeek  \n\n Baker Mayfield\t1\r\n\nBaker Mayfield\t2\n";
        let table = parse_table(text, true);
        assert_eq!(table.headers, vec!["Player", "Week"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1], vec!["Baker Mayfield", "2"]);
    }

    #[test]
    fn test_ragged_rows_are_kept() {
        let table = parse_table("A\tB\tC\n1\t2\n1\t2\t3\t4", true);
        assert_eq!(table.rows[0].len(), 2);
        assert_eq!(table.rows[1].len(), 4);
    }

    #[test]
    fn test_header_only() {
        let table = parse_table("Player\tWeek\n", true);
        assert_eq!(table.headers.len(), 2);
        assert!(table.is_empty());
    }

    #[test]
    fn test_synthetic_headers() {
        let table = parse_table("Baker Mayfield\t1\t@ATL\nBaker Mayfield\t2\t@HOU", false);
        assert_eq!(table.headers, vec!["Col1", "Col2", "Col3"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0][2], "@ATL");
    }

    #[test]
    fn test_to_csv_quoting() {
        let table = TabularData {
            headers: vec!["Player".into(), "Note".into()],
            rows: vec![
                vec!["Mayfield, Baker".into(), "said \"hi\"".into()],
                vec!["Plain".into(), "line\nbreak".into()],
            ],
        };
        assert_eq!(
            to_csv(&table),
            "Player,Note\n\"Mayfield, Baker\",\"said \"\"hi\"\"\"\nPlain,\"line\nbreak\""
        );
    }
}
