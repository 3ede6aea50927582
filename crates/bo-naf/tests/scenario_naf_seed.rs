//! CSV export -> SQL seed.
//!
//! GREEN when:
//! - Both code spellings and both delimiters are accepted.
//! - Duplicate codes keep the last row and output is sorted by code.
//! - Every statement is an idempotent upsert with `active = true`.
//! - Bad rows fail with their line number.

use std::io::Write;

use bo_naf::{parse_csv_file, parse_csv_str, render_sql, NafError, DEFAULT_TABLE};

const COMMA_CSV: &str = "\
code,label
62.01Z,Programmation informatique
01.11Z,\"Culture de céréales (à l'exception du riz), de légumineuses et de graines oléagineuses\"
4511Z,Commerce de voitures et de véhicules automobiles légers
";

#[test]
fn comma_export_parses_sorted() {
    let records = parse_csv_str(COMMA_CSV).unwrap();
    let codes: Vec<&str> = records.iter().map(|r| r.code.as_str()).collect();
    assert_eq!(codes, vec!["0111Z", "4511Z", "6201Z"]);
    assert_eq!(records[0].section, 'A');
    assert_eq!(records[1].section, 'G');
    assert!(records[0].label.contains("l'exception"));
}

#[test]
fn semicolon_export_with_french_header() {
    let csv = "\u{feff}Code;Libellé\n68.20A;Location de logements\n68.20A;Location de logements (révisé)\n";
    let records = parse_csv_str(csv).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].code, "6820A");
    assert_eq!(records[0].section, 'L');
    assert_eq!(records[0].label, "Location de logements (révisé)");
}

#[test]
fn sql_is_an_idempotent_upsert() {
    let records = parse_csv_str(COMMA_CSV).unwrap();
    let sql = render_sql(&records, DEFAULT_TABLE).unwrap();

    let inserts: Vec<&str> = sql.lines().filter(|l| l.starts_with("INSERT")).collect();
    assert_eq!(inserts.len(), 3);
    for stmt in &inserts {
        assert!(stmt.starts_with(
            "INSERT INTO naf_codes (code, label, section, division, \"group\", class, subclass, active) VALUES ("
        ));
        assert!(stmt.contains(", true) ON CONFLICT (code) DO UPDATE SET label = EXCLUDED.label"));
        assert!(stmt.ends_with("active = EXCLUDED.active, updated_at = now();"));
    }
    assert!(inserts[0].contains("'0111Z', 'Culture de céréales (à l''exception du riz)"));
    assert!(inserts[0].contains("'A', '01', '011', '0111', '0111Z', true"));
    assert!(sql.starts_with("-- NAF rév. 2 reference data: 3 codes"));
    assert!(sql.trim_end().ends_with("COMMIT;"));
}

#[test]
fn invalid_code_reports_line() {
    let csv = "code,label\n62.01Z,Programmation\n62.0,Truncated\n";
    let err = parse_csv_str(csv).unwrap_err();
    assert_eq!(
        err,
        NafError::InvalidCode {
            line: 3,
            raw: "62.0".to_string()
        }
    );
}

#[test]
fn unassigned_division_is_rejected() {
    let err = parse_csv_str("code,label\n04.00Z,Nothing here\n").unwrap_err();
    assert!(matches!(err, NafError::UnknownDivision { line: 2, .. }), "got {err:?}");
}

#[test]
fn missing_label_column_is_rejected() {
    let err = parse_csv_str("code,description\n62.01Z,x\n").unwrap_err();
    assert_eq!(err, NafError::MissingHeader("label"));
}

#[test]
fn empty_label_is_rejected() {
    let err = parse_csv_str("code,label\n62.01Z,   \n").unwrap_err();
    assert!(matches!(err, NafError::EmptyLabel { .. }));
}

#[test]
fn reads_from_file() {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    f.write_all(COMMA_CSV.as_bytes()).unwrap();
    let records = parse_csv_file(f.path()).unwrap();
    assert_eq!(records.len(), 3);
}
