//! CSV rendering of flattened records
//!
//! Header is [`FlatRecord::COLUMNS`]. Fields containing a comma, quote, CR or
//! LF are quoted with inner quotes doubled; absent numbers are empty fields.

use crate::error::ExportError;
use crate::types::FlatRecord;
use std::borrow::Cow;
use std::io::Write;

/// Write header plus one line per row
///
/// # Errors
/// Returns [`ExportError::Io`] if the writer fails.
pub fn write_csv<W: Write>(rows: &[FlatRecord], mut writer: W) -> Result<(), ExportError> {
    writeln!(writer, "{}", FlatRecord::COLUMNS.join(","))?;
    for row in rows {
        let fields = row_fields(row);
        let line: Vec<Cow<'_, str>> = fields.iter().map(|f| escape(f)).collect();
        writeln!(writer, "{}", line.join(","))?;
    }
    writer.flush()?;
    Ok(())
}

/// Render rows to an in-memory CSV string
///
/// # Errors
/// Propagates [`write_csv`] failures.
pub fn to_csv_string(rows: &[FlatRecord]) -> Result<String, ExportError> {
    let mut buf = Vec::new();
    write_csv(rows, &mut buf)?;
    Ok(String::from_utf8(buf)?)
}

fn row_fields(row: &FlatRecord) -> [String; 16] {
    [
        row.policy_id.clone(),
        row.tier.clone(),
        row.status.clone(),
        row.confidence.clone(),
        row.matched.to_string(),
        number(row.raw_score),
        number(row.capped_score),
        number(row.decision_score),
        number(row.threshold),
        row.quality_flags.clone(),
        row.ai_invoked.to_string(),
        row.ai_invocation_reason.clone(),
        row.best_evidence_location.clone(),
        row.keyword_source.clone(),
        row.evidence_criteria_used.to_string(),
        row.trace_completeness.to_string(),
    ]
}

fn number(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn escape(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\r', '\n']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flatten::flatten_record;
    use serde_json::json;

    fn row() -> FlatRecord {
        flatten_record(&json!({
            "policy_id": "POL-1",
            "tier": "T1",
            "keyword": {
                "raw_score": 5.0,
                "decision_score": 0.8,
                "quality_flags": {"a": true, "b": true}
            },
            "decision": {"display_status": "PASS", "confidence_label": "HIGH", "matched": true},
            "evidence": {"best_evidence_location": "Section \"2\", para 1"}
        }))
    }

    #[test]
    fn header_matches_columns() {
        let csv = to_csv_string(&[]).unwrap();
        assert_eq!(csv, format!("{}\n", FlatRecord::COLUMNS.join(",")));
    }

    #[test]
    fn renders_row_with_quoting_and_blanks() {
        let csv = to_csv_string(&[row()]).unwrap();
        let line = csv.lines().nth(1).unwrap();
        assert_eq!(
            line,
            "POL-1,T1,PASS,HIGH,true,5,,0.8,,\"a,b\",false,,\"Section \"\"2\"\", para 1\",,false,0"
        );
    }

    #[test]
    fn embedded_newline_is_quoted() {
        assert_eq!(escape("a\nb"), "\"a\nb\"");
        assert_eq!(escape("plain"), "plain");
    }

    #[test]
    fn writes_through_io_writer() {
        let mut out = Vec::new();
        write_csv(&[row(), row()], &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap().lines().count(), 3);
    }
}
