//! CSV export of optimization passes.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::control::PassReport;
use crate::error::Result;

/// Column header, one row per output per pass.
const HEADER: &str = "at_ms,available_kw,budget_kw,output_id,priority,\
                       power_kw,duty,enabled,total_kw";

/// Appends pass reports as CSV rows to any writer.
///
/// The header is written on construction. Output is deterministic for
/// identical reports.
pub struct PassCsvWriter<W: Write> {
    wtr: csv::Writer<W>,
}

impl PassCsvWriter<io::BufWriter<File>> {
    /// Creates (or truncates) the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if file creation or the header write fails.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)?;
        Self::new(io::BufWriter::new(file))
    }
}

impl<W: Write> PassCsvWriter<W> {
    /// # Errors
    ///
    /// Returns an error if the header cannot be written.
    pub fn new(writer: W) -> Result<Self> {
        let mut wtr = csv::WriterBuilder::new().from_writer(writer);
        wtr.write_record(HEADER.split(',').map(str::trim))?;
        Ok(Self { wtr })
    }

    /// Writes one row per allocation in `report`, then flushes.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write(&mut self, report: &PassReport) -> Result<()> {
        for a in &report.allocations {
            self.wtr.write_record(&[
                report.at_ms.to_string(),
                format!("{:.4}", report.available_kw),
                format!("{:.4}", report.budget_kw),
                a.output_id.clone(),
                a.priority.to_string(),
                format!("{:.4}", a.power_kw),
                a.duty.to_string(),
                a.enabled.to_string(),
                format!("{:.4}", report.total_kw),
            ])?;
        }
        self.wtr.flush()?;
        Ok(())
    }

    /// Flushes and returns the underlying writer.
    ///
    /// # Errors
    ///
    /// Returns an error if the final flush fails.
    pub fn into_inner(self) -> Result<W> {
        self.wtr.into_inner().map_err(|e| e.into_error().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::Allocation;

    fn make_report(at_ms: u64) -> PassReport {
        PassReport {
            at_ms,
            available_kw: 1.2,
            budget_kw: 1.2,
            total_kw: 1.0,
            allocations: vec![
                Allocation {
                    output_id: "pump".into(),
                    priority: 1,
                    power_kw: 1.0,
                    duty: 100,
                    enabled: true,
                    remaining_kw: 0.2,
                },
                Allocation {
                    output_id: "heater".into(),
                    priority: 2,
                    power_kw: 0.0,
                    duty: 0,
                    enabled: true,
                    remaining_kw: 0.2,
                },
            ],
        }
    }

    fn render(reports: &[PassReport]) -> String {
        let mut w = PassCsvWriter::new(Vec::new()).expect("header");
        for r in reports {
            w.write(r).expect("write row");
        }
        let buf = w.into_inner().expect("flush");
        String::from_utf8(buf).expect("utf8")
    }

    #[test]
    fn header_matches_columns() {
        let output = render(&[]);
        assert_eq!(
            output.lines().next(),
            Some("at_ms,available_kw,budget_kw,output_id,priority,power_kw,duty,enabled,total_kw")
        );
    }

    #[test]
    fn one_row_per_output_per_pass() {
        let output = render(&[make_report(0), make_report(15_000)]);
        // 1 header + 2 passes x 2 outputs
        assert_eq!(output.lines().count(), 5);
        assert!(output.contains("15000,1.2000,1.2000,pump,1,1.0000,100,true,1.0000"));
    }

    #[test]
    fn rows_parse_back() {
        let output = render(&[make_report(0)]);
        let mut rdr = csv::ReaderBuilder::new().from_reader(output.as_bytes());
        let mut rows = 0;
        for record in rdr.records() {
            let rec = record.expect("every row should parse");
            assert!(rec[5].parse::<f32>().is_ok());
            assert!(rec[6].parse::<u8>().is_ok());
            assert!(rec[7].parse::<bool>().is_ok());
            rows += 1;
        }
        assert_eq!(rows, 2);
    }
}
