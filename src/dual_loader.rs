//! Initial-dual loader (component C6, spec §4.5): reads a table of
//! `(index, value)` pairs from disk, or returns the zero vector when no
//! path is supplied. Disk ordering need not be sorted —
//! [`SparseVector::from_pairs`] sorts on construction.

use std::path::Path;

use problemo::Problem;
use serde::Deserialize;

use crate::sparse::SparseVector;
use crate::{E, I};

#[derive(Debug, Deserialize)]
struct DualRow {
    index: I,
    value: E,
}

/// Loads the initial `λ` for a solve of the given dimensionality. A
/// `None` path yields the zero vector; a present path is read as CSV
/// with header `index,value` (the concrete backing for the logical
/// `{index: int32, value: float64}` schema — see `crate::serializer`).
pub fn load_initial_dual(path: Option<&Path>, dim: I) -> Result<SparseVector, Problem> {
    let Some(path) = path else {
        return Ok(SparseVector::zeros(dim));
    };
    let mut reader = csv::Reader::from_path(path)?;
    let mut pairs = Vec::new();
    for record in reader.deserialize() {
        let row: DualRow = record?;
        pairs.push((row.index, row.value));
    }
    Ok(SparseVector::from_pairs(dim, pairs)?)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn missing_path_yields_the_zero_vector() {
        let v = load_initial_dual(None, 5).unwrap();
        assert_eq!(v.nnz(), 0);
        assert_eq!(v.dim(), 5);
    }

    #[test]
    fn reads_unsorted_pairs_and_sorts_them() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("initial_lambda.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "index,value").unwrap();
        writeln!(file, "3,0.5").unwrap();
        writeln!(file, "0,1.25").unwrap();
        drop(file);

        let v = load_initial_dual(Some(&path), 4).unwrap();
        assert_eq!(v.indices(), &[0, 3]);
        assert_eq!(v.get(0), 1.25);
        assert_eq!(v.get(3), 0.5);
        assert_eq!(v.get(1), 0.0);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does_not_exist.csv");
        assert!(load_initial_dual(Some(&path), 4).is_err());
    }
}
