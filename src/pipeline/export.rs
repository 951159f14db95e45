// src/pipeline/export.rs

//! Record export.

use std::io::{self, Write};
use std::path::Path;

use crate::error::Result;
use crate::models::Record;

/// Column titles of the CSV export.
pub const CSV_HEADER: [&str; 5] = ["Case Number", "Case Type", "Applicant", "Filing Date", "URL"];

/// Write one fully quoted CSV row.
pub fn write_row<W: Write>(mut w: W, row: &[&str]) -> io::Result<()> {
    let mut first = true;
    for cell in row {
        if !first {
            w.write_all(b",")?;
        }
        first = false;
        write!(w, "\"{}\"", cell.replace('"', "\"\""))?;
    }
    w.write_all(b"\n")
}

/// Render records as CSV text, header included.
pub fn to_csv(records: &[Record]) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    write_row(&mut out, &CSV_HEADER)?;
    for record in records {
        write_row(&mut out, &record.csv_row())?;
    }
    Ok(out)
}

/// Write records to a CSV file, replacing it.
pub async fn write_csv(path: &Path, records: &[Record]) -> Result<()> {
    let bytes = to_csv(records)?;
    write_replacing(path, &bytes).await?;
    log::info!("Wrote {} records to {}", records.len(), path.display());
    Ok(())
}

/// Write records, with operator and attachments, as pretty JSON.
pub async fn write_json(path: &Path, records: &[Record]) -> Result<()> {
    let json = serde_json::to_vec_pretty(records)?;
    write_replacing(path, &json).await?;
    log::info!("Wrote {} records to {}", records.len(), path.display());
    Ok(())
}

async fn write_replacing(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(id: &str, applicant: &str) -> Record {
        Record {
            id: id.into(),
            record_type: "Compulsory Pooling".into(),
            applicant: applicant.into(),
            filing_date: "07/01/2019".into(),
            url: format!("http://ocd.example/imaging/CaseFile.aspx?id={id}"),
            ..Record::default()
        }
    }

    #[test]
    fn test_csv_quotes_every_cell() {
        let out = to_csv(&[record("CP-100", r#"Acme "West", LLC"#)]).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(
            lines[0],
            r#""Case Number","Case Type","Applicant","Filing Date","URL""#
        );
        assert_eq!(
            lines[1],
            r#""CP-100","Compulsory Pooling","Acme ""West"", LLC","07/01/2019","http://ocd.example/imaging/CaseFile.aspx?id=CP-100""#
        );
    }

    #[tokio::test]
    async fn test_write_csv_and_json() {
        let dir = TempDir::new().unwrap();
        let records = vec![record("CP-100", "Acme"), record("CP-101", "Beta")];

        let csv_path = dir.path().join("out/records.csv");
        write_csv(&csv_path, &records).await.unwrap();
        let csv = std::fs::read_to_string(&csv_path).unwrap();
        assert_eq!(csv.lines().count(), 3);

        let json_path = dir.path().join("records.json");
        write_json(&json_path, &records).await.unwrap();
        let parsed: Vec<Record> =
            serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(parsed, records);
    }
}
