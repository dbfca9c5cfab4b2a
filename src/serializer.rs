//! Result serializer (component C8, spec §4.6): writes `log/`, `dual/`,
//! `violation/` and `primal/` artifacts under a common output directory.
//!
//! **Expansion.** AVRO/ORC are named in spec §6 as the external
//! data-parallel layer's formats; `TableFormat` models the choice but
//! CSV is the only format this crate actually backs (see `SPEC_FULL.md`).
//! Directory replacement writes to a sibling temp directory and renames
//! it over the target, so a crash never leaves a half-written output
//! directory where a previous run's output used to be (spec §5
//! "Resource discipline").

use std::fs;
use std::path::Path;
use std::str::FromStr;

use derive_more::{Display, Error};
use problemo::Problem;
use serde::Serialize;

use crate::E;
use crate::optim::OptimizerResult;
use crate::sparse::SparseVector;

/// Logical table format named in spec §6 (`--driver.outputFormat`). Only
/// `Csv` is backed; `write_results` rejects the others rather than
/// silently writing CSV under an AVRO/ORC label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TableFormat {
    #[default]
    Csv,
    Avro,
    Orc,
}

impl FromStr for TableFormat {
    type Err = SerializerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Csv" | "CSV" => Ok(TableFormat::Csv),
            "Avro" | "AVRO" => Ok(TableFormat::Avro),
            "Orc" | "ORC" => Ok(TableFormat::Orc),
            other => Err(SerializerError::UnknownTableFormat(other.to_string())),
        }
    }
}

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum SerializerError {
    #[display("output format '{_0}' is not recognized")]
    UnknownTableFormat(String),
    #[display("output format {_0:?} is not backed by a writer")]
    UnsupportedFormat(TableFormat),
}

#[derive(Debug, Serialize)]
struct IndexValueRow {
    index: usize,
    value: E,
}

fn write_index_value_table(dir: &Path, filename: &str, vector: &SparseVector) -> Result<(), Problem> {
    fs::create_dir_all(dir)?;
    let mut writer = csv::Writer::from_path(dir.join(filename))?;
    for (index, value) in vector.iter() {
        writer.serialize(IndexValueRow { index, value })?;
    }
    writer.flush()?;
    Ok(())
}

fn write_log(dir: &Path, result: &OptimizerResult) -> Result<(), Problem> {
    fs::create_dir_all(dir)?;
    let mut contents = String::new();
    for entry in &result.log {
        contents.push_str(&entry.summary_line());
        contents.push('\n');
    }
    contents.push_str(&format!(
        "terminal status: {:?}, iterations: {}, dual value: {:.6e}, active constraints: {}\n",
        result.status,
        result.iterations,
        result.dual_value,
        result.active_constraints()
    ));
    fs::write(dir.join("log.txt"), contents)?;
    Ok(())
}

fn write_primal(dir: &Path, result: &OptimizerResult) -> Result<(), Problem> {
    let Some(view) = &result.primal_view else {
        return Ok(());
    };
    fs::create_dir_all(dir)?;
    let mut writer = csv::Writer::from_path(dir.join("primal.csv"))?;
    writer.write_record(&view.columns)?;
    for row in &view.rows {
        writer.write_record(row.iter().map(|v| v.to_string()))?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes `log/`, `dual/`, `violation/` and `primal/` under a temp
/// staging directory next to `output_path`, then atomically renames it
/// into place (spec §4.6 "Atomic replacement ... is expected").
pub fn write_results(output_path: &Path, result: &OptimizerResult, format: TableFormat) -> Result<(), Problem> {
    if format != TableFormat::Csv {
        return Err(Problem::from(SerializerError::UnsupportedFormat(format)));
    }
    let parent = output_path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;
    let staging = parent.join(format!(
        ".{}.staging",
        output_path.file_name().and_then(|n| n.to_str()).unwrap_or("dualip-output")
    ));
    if staging.exists() {
        fs::remove_dir_all(&staging)?;
    }
    fs::create_dir_all(&staging)?;

    write_log(&staging.join("log"), result)?;
    write_index_value_table(&staging.join("dual"), "dual.csv", &result.lambda)?;
    write_index_value_table(&staging.join("violation"), "violation.csv", &result.slack)?;
    write_primal(&staging.join("primal"), result)?;

    if output_path.exists() {
        fs::remove_dir_all(output_path)?;
    }
    fs::rename(&staging, output_path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objective::{DualResult, PrimalView};
    use crate::optim::Status;

    fn sample_result() -> OptimizerResult {
        let lambda = SparseVector::from_pairs(2, vec![(0, 1.5)]).unwrap();
        let gradient = SparseVector::from_pairs(2, vec![(0, 0.0), (1, -0.2)]).unwrap();
        let dual_result = DualResult::new(3.0, gradient, 3.0, E::INFINITY);
        let mut primal = PrimalView::new(vec!["x".to_string()]);
        primal.push_row(vec![1.5]);
        OptimizerResult {
            status: Status::Converged,
            iterations: 4,
            lambda,
            slack: dual_result.slack,
            dual_value: dual_result.dual_value,
            primal_view: Some(primal),
            log: Vec::new(),
        }
    }

    #[test]
    fn writes_all_four_artifacts_and_replaces_an_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("run_output");
        fs::create_dir_all(&output).unwrap();
        fs::write(output.join("stale.txt"), "from a previous run").unwrap();

        write_results(&output, &sample_result(), TableFormat::Csv).unwrap();

        assert!(output.join("log/log.txt").is_file());
        assert!(output.join("dual/dual.csv").is_file());
        assert!(output.join("violation/violation.csv").is_file());
        assert!(output.join("primal/primal.csv").is_file());
        assert!(!output.join("stale.txt").exists());

        let dual_contents = fs::read_to_string(output.join("dual/dual.csv")).unwrap();
        assert!(dual_contents.contains("0,1.5"));
    }

    #[test]
    fn rejects_formats_with_no_backing_writer() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("run_output");
        assert!(write_results(&output, &sample_result(), TableFormat::Avro).is_err());
        assert!(!output.exists());
    }

    #[test]
    fn table_format_parses_known_values_only() {
        assert_eq!("Csv".parse::<TableFormat>().unwrap(), TableFormat::Csv);
        assert_eq!("AVRO".parse::<TableFormat>().unwrap(), TableFormat::Avro);
        assert!("bogus".parse::<TableFormat>().is_err());
    }
}
