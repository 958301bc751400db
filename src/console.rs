use std::sync::OnceLock;
use regex::Regex;
use crate::record::{Record, Value};

static BRACKET_RE: OnceLock<Regex> = OnceLock::new();

fn bracket_re() -> &'static Regex {
    BRACKET_RE.get_or_init(|| Regex::new(r"\[(.*?)\s*:\s*(.*?)\s*\]").unwrap())
}

/// Extracts every `[Key : Value]` occurrence from a console transcript.
/// Multiple pairs per line are allowed and unrelated text is ignored.
/// An empty key is transcript noise and emits nothing; an empty value maps
/// the key to `Null`. A key seen twice keeps the later occurrence.
pub fn bracket_fields(text: &str) -> Record {
    let re = bracket_re();
    let mut rec = Record::new();
    for line in text.lines() {
        for cap in re.captures_iter(line) {
            let key = cap[1].trim();
            if key.is_empty() { continue; }
            rec.set(key, Value::from_text(&cap[2]));
        }
    }
    rec
}

#[derive(Clone, Copy, Debug)]
pub struct ColumnSpec {
    pub name: &'static str,
    /// Byte offsets into the data line, `[start, end)`. Console output is
    /// ASCII; offsets past end-of-line clamp to what the line has.
    pub start: usize,
    pub end: usize,
}

/// Layout contract for one fixed-column console table. The offsets are
/// agreed with the source format, never inferred from the text.
#[derive(Clone, Copy, Debug)]
pub struct TableSpec {
    /// A line starting with this marks the column-header row; nothing before
    /// it is part of the table.
    pub header_marker: &'static str,
    /// Data rows start with this.
    pub row_marker: &'static str,
    /// Dashed divider rows start with this and are skipped.
    pub separator_marker: &'static str,
    pub columns: &'static [ColumnSpec],
    /// Columns that must all be non-blank for a row to be emitted.
    pub identity: &'static [&'static str],
}

fn slice_field(line: &str, start: usize, end: usize) -> &str {
    if start >= line.len() { return ""; }
    line.get(start..end.min(line.len())).unwrap_or("")
}

/// Parses the fixed-column table described by `spec` out of a transcript.
/// Rows appear in source order. A row whose identity fields are not all
/// non-blank is dropped. The table ends at the first line that is neither
/// a data row, a separator, nor blank; no lookahead past that line.
pub fn fixed_table(text: &str, spec: &TableSpec) -> Vec<Record> {
    let mut rows = Vec::new();
    let mut in_table = false;
    for line in text.lines() {
        if !in_table {
            if line.starts_with(spec.header_marker) { in_table = true; }
            continue;
        }
        if line.trim().is_empty() || line.starts_with(spec.separator_marker) { continue; }
        if !line.starts_with(spec.row_marker) { break; }
        let identity_ok = spec.identity.iter().all(|id| {
            spec.columns.iter().find(|c| c.name == *id)
                .map(|c| !slice_field(line, c.start, c.end).trim().is_empty())
                .unwrap_or(false)
        });
        if !identity_ok { continue; }
        let mut rec = Record::new();
        for col in spec.columns {
            rec.set(col.name, Value::from_text(slice_field(line, col.start, col.end)));
        }
        rows.push(rec);
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bracket_pairs_are_trimmed() {
        let rec = bracket_fields("noise [ GameName :  baal-run ] more [Difficulty:Hell]\n");
        assert_eq!(rec.get_str("GameName"), Some("baal-run"));
        assert_eq!(rec.get_str("Difficulty"), Some("Hell"));
    }

    #[test]
    fn bracket_roundtrip_reproduces_trimmed_value() {
        let rec = bracket_fields("[ Owner :   admin  ]");
        let line = format!("[Owner : {}]", rec.get_str("Owner").unwrap());
        let again = bracket_fields(&line);
        assert_eq!(again.get_str("Owner"), Some("admin"));
    }

    #[test]
    fn empty_value_is_present_but_null() {
        let rec = bracket_fields("[Password : ] [GameName : run]");
        assert_eq!(rec.get("Password"), Some(&Value::Null));
        assert_eq!(rec.get("Creator"), None);
    }

    #[test]
    fn empty_key_is_discarded() {
        let rec = bracket_fields("[ : orphan] [GameName : run]");
        assert_eq!(rec.len(), 1);
        assert_eq!(rec.get_str("GameName"), Some("run"));
    }

    #[test]
    fn duplicate_key_keeps_later_occurrence() {
        let rec = bracket_fields("[Status : open]\n[Status : started]");
        assert_eq!(rec.get_str("Status"), Some("started"));
    }

    const TEST_TABLE: TableSpec = TableSpec {
        header_marker: "+-No",
        row_marker: "|",
        separator_marker: "+---",
        columns: &[
            ColumnSpec { name: "No", start: 2, end: 6 },
            ColumnSpec { name: "AcctName", start: 6, end: 22 },
            ColumnSpec { name: "CharName", start: 22, end: 40 },
        ],
        identity: &["No", "AcctName", "CharName"],
    };

    fn data_line(no: &str, acct: &str, name: &str) -> String {
        format!("| {:<4}{:<16}{:<18}", no, acct, name)
    }

    #[test]
    fn one_row_between_separator_and_blank() {
        let text = format!(
            "+-No--+-AcctName------+-CharName-------+\n+----------------------------------------+\n{}\n\n",
            data_line("1", "admin", "Sorceress")
        );
        let rows = fixed_table(&text, &TEST_TABLE);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_str("No"), Some("1"));
        assert_eq!(rows[0].get_str("AcctName"), Some("admin"));
        assert_eq!(rows[0].get_str("CharName"), Some("Sorceress"));
    }

    #[test]
    fn blank_identity_drops_row() {
        let text = format!("+-No--+\n{}\n", data_line("1", "", "Sorceress"));
        let rows = fixed_table(&text, &TEST_TABLE);
        assert!(rows.is_empty());
    }

    #[test]
    fn table_ends_at_first_mismatching_line() {
        let text = format!(
            "+-No--+\n{}\nD2GS>\n{}\n",
            data_line("1", "acctone", "CharOne"),
            data_line("2", "accttwo", "CharTwo")
        );
        let rows = fixed_table(&text, &TEST_TABLE);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_str("CharName"), Some("CharOne"));
    }

    #[test]
    fn lines_before_header_are_ignored() {
        let text = format!(
            "| stray row that looks like data\n+-No--+\n{}\n",
            data_line("3", "acct", "Pala")
        );
        let rows = fixed_table(&text, &TEST_TABLE);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_str("No"), Some("3"));
    }

    #[test]
    fn short_line_clamps_instead_of_panicking() {
        // CharName column is declared 18 wide but the line stops after one char.
        let text = format!("+-No--+\n| {:<4}{:<16}C\n", "4", "acct");
        let rows = fixed_table(&text, &TEST_TABLE);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_str("CharName"), Some("C"));
    }
}
