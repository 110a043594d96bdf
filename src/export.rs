//! CSV export of generated metadata
//!
//! The column set comes from the profile (`csv_columns`, falling back to the
//! required fields), and records are emitted in the order the client sent
//! them. Quoting follows RFC 4180: fields containing commas, quotes, or line
//! breaks are wrapped in double quotes with embedded quotes doubled.

use serde::Deserialize;

use crate::pipeline::Metadata;
use crate::profiles::ProcessingProfile;

/// One exported row: the image path plus its generated metadata
#[derive(Debug, Clone, Deserialize)]
pub struct ExportRecord {
    pub image: String,
    pub metadata: Metadata,
}

/// Render records as CSV text with a header row. Fields a record lacks are
/// left empty rather than failing the export.
pub fn to_csv(profile: &ProcessingProfile, records: &[ExportRecord]) -> String {
    let columns = effective_columns(profile);

    let mut out = String::new();
    out.push_str("image");
    for column in &columns {
        out.push(',');
        out.push_str(&escape(column));
    }
    out.push_str("\r\n");

    for record in records {
        out.push_str(&escape(&record.image));
        for column in &columns {
            out.push(',');
            if let Some(value) = record.metadata.get(column.as_str()) {
                out.push_str(&escape(value));
            }
        }
        out.push_str("\r\n");
    }

    out
}

fn effective_columns(profile: &ProcessingProfile) -> Vec<String> {
    if profile.csv_columns.is_empty() {
        profile.required_fields.clone()
    } else {
        profile.csv_columns.clone()
    }
}

fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
