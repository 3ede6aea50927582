//! bo-naf
//!
//! Builds the SQL seed file for the French activity classification (NAF
//! rév. 2) reference table from a CSV export.
//!
//! ## CSV column contract (case-insensitive, order-independent)
//!
//! | Column  | Example                          | Notes                          |
//! |---------|----------------------------------|--------------------------------|
//! | `code`  | `01.11Z` or `0111Z`              | dots and spaces are stripped   |
//! | `label` | `Culture de céréales ...`        | aliases: `libelle`, `libellé`  |
//!
//! The delimiter is `;` when the header line contains more `;` than `,`
//! (French spreadsheet exports), `,` otherwise.

mod section;

use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Write as _;
use std::path::Path;

use serde::{Deserialize, Serialize};

pub use section::section_for_division;

pub const DEFAULT_TABLE: &str = "naf_codes";

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NafError {
    /// An I/O or CSV-library error.
    Io(String),
    /// The header row is missing a required column.
    MissingHeader(&'static str),
    /// A code that is not 4 digits followed by a letter.
    InvalidCode { line: u64, raw: String },
    /// A division outside every NAF section range.
    UnknownDivision { line: u64, code: String },
    EmptyLabel { line: u64, code: String },
    /// Target table name is not a plain SQL identifier.
    InvalidTable(String),
}

impl fmt::Display for NafError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NafError::Io(msg) => write!(f, "naf csv io error: {msg}"),
            NafError::MissingHeader(col) => {
                write!(f, "naf csv missing required header column: '{col}'")
            }
            NafError::InvalidCode { line, raw } => {
                write!(f, "naf csv line {line}: invalid code '{raw}'")
            }
            NafError::UnknownDivision { line, code } => {
                write!(f, "naf csv line {line}: code '{code}' has no NAF section")
            }
            NafError::EmptyLabel { line, code } => {
                write!(f, "naf csv line {line}: code '{code}' has an empty label")
            }
            NafError::InvalidTable(t) => write!(f, "invalid table name '{t}'"),
        }
    }
}

impl std::error::Error for NafError {}

impl From<csv::Error> for NafError {
    fn from(e: csv::Error) -> Self {
        NafError::Io(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// One classification code with its derived hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NafRecord {
    /// Normalised 5-char code, e.g. `0111Z`.
    pub code: String,
    pub label: String,
    pub section: char,
    /// `01`
    pub division: String,
    /// `011`
    pub group: String,
    /// `0111`
    pub class: String,
    /// Same as `code`.
    pub subclass: String,
}

impl NafRecord {
    fn build(line: u64, raw_code: &str, label: &str) -> Result<Self, NafError> {
        let code = normalize_code(raw_code).ok_or_else(|| NafError::InvalidCode {
            line,
            raw: raw_code.to_string(),
        })?;
        let label = label.trim();
        if label.is_empty() {
            return Err(NafError::EmptyLabel { line, code });
        }
        let division: u8 = code[..2].parse().map_err(|_| NafError::InvalidCode {
            line,
            raw: raw_code.to_string(),
        })?;
        let section = section_for_division(division).ok_or_else(|| NafError::UnknownDivision {
            line,
            code: code.clone(),
        })?;

        Ok(Self {
            label: label.to_string(),
            section,
            division: code[..2].to_string(),
            group: code[..3].to_string(),
            class: code[..4].to_string(),
            subclass: code.clone(),
            code,
        })
    }
}

/// `01.11z` -> `0111Z`. `None` unless the result is 4 digits and a letter.
pub fn normalize_code(raw: &str) -> Option<String> {
    let code: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '.')
        .map(|c| c.to_ascii_uppercase())
        .collect();
    let bytes = code.as_bytes();
    let ok = bytes.len() == 5
        && bytes[..4].iter().all(u8::is_ascii_digit)
        && bytes[4].is_ascii_uppercase();
    ok.then_some(code)
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

pub fn parse_csv_file(path: &Path) -> Result<Vec<NafRecord>, NafError> {
    let buf = std::fs::read_to_string(path)
        .map_err(|e| NafError::Io(format!("read '{}': {e}", path.display())))?;
    parse_csv_str(&buf)
}

/// Parse CSV text into records, deduplicated by code (last row wins) and
/// sorted by code.
pub fn parse_csv_str(src: &str) -> Result<Vec<NafRecord>, NafError> {
    let src = src.strip_prefix('\u{feff}').unwrap_or(src);
    let header = src.lines().next().unwrap_or_default();
    let delimiter = if header.matches(';').count() > header.matches(',').count() {
        b';'
    } else {
        b','
    };

    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(src.as_bytes());

    let headers = rdr.headers()?.clone();
    let find = |names: &[&str]| {
        headers
            .iter()
            .position(|h| names.iter().any(|n| h.eq_ignore_ascii_case(n)))
    };
    let code_idx = find(&["code"]).ok_or(NafError::MissingHeader("code"))?;
    let label_idx = find(&["label", "libelle", "libellé"]).ok_or(NafError::MissingHeader("label"))?;

    let mut by_code: BTreeMap<String, NafRecord> = BTreeMap::new();
    for rec in rdr.records() {
        let rec = rec?;
        let line = rec.position().map(|p| p.line()).unwrap_or(0);
        let raw_code = rec.get(code_idx).unwrap_or_default();
        if raw_code.is_empty() && rec.iter().all(str::is_empty) {
            continue;
        }
        let record = NafRecord::build(line, raw_code, rec.get(label_idx).unwrap_or_default())?;
        by_code.insert(record.code.clone(), record);
    }

    Ok(by_code.into_values().collect())
}

// ---------------------------------------------------------------------------
// SQL rendering
// ---------------------------------------------------------------------------

fn is_sql_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        && !name.ends_with('.')
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Idempotent upsert script: one statement per record, `active` always true.
pub fn render_sql(records: &[NafRecord], table: &str) -> Result<String, NafError> {
    if !is_sql_identifier(table) {
        return Err(NafError::InvalidTable(table.to_string()));
    }

    let mut out = String::new();
    let _ = writeln!(out, "-- NAF rév. 2 reference data: {} codes", records.len());
    let _ = writeln!(out, "-- Re-runnable: existing codes are updated in place.");
    let _ = writeln!(out, "BEGIN;");
    for r in records {
        let _ = writeln!(
            out,
            "INSERT INTO {table} (code, label, section, division, \"group\", class, subclass, active) \
             VALUES ({}, {}, {}, {}, {}, {}, {}, true) \
             ON CONFLICT (code) DO UPDATE SET label = EXCLUDED.label, section = EXCLUDED.section, \
             division = EXCLUDED.division, \"group\" = EXCLUDED.\"group\", class = EXCLUDED.class, \
             subclass = EXCLUDED.subclass, active = EXCLUDED.active, updated_at = now();",
            quote(&r.code),
            quote(&r.label),
            quote(&r.section.to_string()),
            quote(&r.division),
            quote(&r.group),
            quote(&r.class),
            quote(&r.subclass),
        );
    }
    let _ = writeln!(out, "COMMIT;");
    Ok(out)
}
