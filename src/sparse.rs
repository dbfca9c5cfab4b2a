//! Sparse vector algebra for the dual `λ` and its gradient `g(λ)`.
//!
//! Both are semantically sparse over the coupling-constraint index set
//! (most duals are zero at optimum), while the quasi-Newton engine that
//! drives them operates on dense vectors. This module is the only place
//! that mismatch is made concrete: conversion happens once per evaluation
//! at the boundary (see [`crate::optim::lbfgsb`]).

use derive_more::{Display, Error};
use faer::Col;

use crate::{E, I};

#[derive(Debug, Display, Error, PartialEq, Eq)]
pub enum SparseVectorError {
    #[display("index {_0} out of bounds for dimension {_1}")]
    IndexOutOfBounds(I, I),
    #[display("duplicate index {_0} in sparse vector construction")]
    DuplicateIndex(I),
}

/// A sparse vector over `0..dim`, stored as parallel `(index, value)`
/// arrays kept sorted by index. Entries are implicitly zero everywhere
/// else.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseVector {
    dim: I,
    indices: Vec<I>,
    values: Vec<E>,
}

impl SparseVector {
    /// Builds a sparse vector from `(index, value)` pairs in arbitrary
    /// order. Zero-valued entries are dropped; duplicate or out-of-range
    /// indices are rejected.
    pub fn from_pairs(dim: I, mut pairs: Vec<(I, E)>) -> Result<Self, SparseVectorError> {
        pairs.sort_by_key(|(idx, _)| *idx);
        for window in pairs.windows(2) {
            if window[0].0 == window[1].0 {
                return Err(SparseVectorError::DuplicateIndex(window[0].0));
            }
        }
        let mut indices = Vec::with_capacity(pairs.len());
        let mut values = Vec::with_capacity(pairs.len());
        for (idx, val) in pairs {
            if idx >= dim {
                return Err(SparseVectorError::IndexOutOfBounds(idx, dim));
            }
            if val != 0.0 {
                indices.push(idx);
                values.push(val);
            }
        }
        Ok(Self { dim, indices, values })
    }

    /// The all-zero vector of the given dimensionality.
    pub fn zeros(dim: I) -> Self {
        Self { dim, indices: Vec::new(), values: Vec::new() }
    }

    pub fn dim(&self) -> I {
        self.dim
    }

    /// Number of explicitly-stored (non-zero) entries.
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    pub fn indices(&self) -> &[I] {
        &self.indices
    }

    pub fn values(&self) -> &[E] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (I, E)> + '_ {
        self.indices.iter().copied().zip(self.values.iter().copied())
    }

    pub fn get(&self, index: I) -> E {
        match self.indices.binary_search(&index) {
            Ok(pos) => self.values[pos],
            Err(_) => 0.0,
        }
    }

    /// Scalar multiple of this vector.
    pub fn scale(&self, factor: E) -> Self {
        if factor == 0.0 {
            return Self::zeros(self.dim);
        }
        Self {
            dim: self.dim,
            indices: self.indices.clone(),
            values: self.values.iter().map(|v| v * factor).collect(),
        }
    }

    /// Elementwise sum, merging the two sorted index lists.
    pub fn add(&self, other: &Self) -> Self {
        assert_eq!(self.dim, other.dim, "sparse vectors must share a dimension");
        let mut indices = Vec::with_capacity(self.nnz() + other.nnz());
        let mut values = Vec::with_capacity(self.nnz() + other.nnz());
        let (mut i, mut j) = (0usize, 0usize);
        while i < self.indices.len() && j < other.indices.len() {
            match self.indices[i].cmp(&other.indices[j]) {
                std::cmp::Ordering::Less => {
                    indices.push(self.indices[i]);
                    values.push(self.values[i]);
                    i += 1;
                }
                std::cmp::Ordering::Greater => {
                    indices.push(other.indices[j]);
                    values.push(other.values[j]);
                    j += 1;
                }
                std::cmp::Ordering::Equal => {
                    let sum = self.values[i] + other.values[j];
                    if sum != 0.0 {
                        indices.push(self.indices[i]);
                        values.push(sum);
                    }
                    i += 1;
                    j += 1;
                }
            }
        }
        indices.extend_from_slice(&self.indices[i..]);
        values.extend_from_slice(&self.values[i..]);
        indices.extend_from_slice(&other.indices[j..]);
        values.extend_from_slice(&other.values[j..]);
        Self { dim: self.dim, indices, values }
    }

    /// Inner product via a merge-join over the sorted index lists.
    pub fn dot(&self, other: &Self) -> E {
        assert_eq!(self.dim, other.dim, "sparse vectors must share a dimension");
        let (mut i, mut j) = (0usize, 0usize);
        let mut acc = 0.0;
        while i < self.indices.len() && j < other.indices.len() {
            match self.indices[i].cmp(&other.indices[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    acc += self.values[i] * other.values[j];
                    i += 1;
                    j += 1;
                }
            }
        }
        acc
    }

    /// `max(0, -g_i)` over all components — the worst violation of
    /// `A x <= b` (spec §3, `maxSlack`).
    pub fn max_violation(&self) -> E {
        self.values.iter().fold(0.0, |acc, &v| acc.max(-v))
    }

    pub fn to_dense(&self) -> Col<E> {
        let mut out = Col::<E>::zeros(self.dim);
        for (idx, val) in self.iter() {
            out[idx] = val;
        }
        out
    }

    pub fn from_dense(dense: &Col<E>, tol: E) -> Self {
        let mut indices = Vec::new();
        let mut values = Vec::new();
        for i in 0..dense.nrows() {
            let v = dense[i];
            if v.abs() > tol {
                indices.push(i);
                values.push(v);
            }
        }
        Self { dim: dense.nrows(), indices, values }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_sorts_and_drops_zeros() {
        let v = SparseVector::from_pairs(5, vec![(3, 1.0), (1, 0.0), (0, 2.0)]).unwrap();
        assert_eq!(v.indices(), &[0, 3]);
        assert_eq!(v.values(), &[2.0, 1.0]);
    }

    #[test]
    fn rejects_duplicate_index() {
        let err = SparseVector::from_pairs(3, vec![(1, 1.0), (1, 2.0)]).unwrap_err();
        assert_eq!(err, SparseVectorError::DuplicateIndex(1));
    }

    #[test]
    fn rejects_out_of_bounds_index() {
        let err = SparseVector::from_pairs(3, vec![(5, 1.0)]).unwrap_err();
        assert_eq!(err, SparseVectorError::IndexOutOfBounds(5, 3));
    }

    #[test]
    fn dot_and_add_merge_disjoint_and_overlapping_indices() {
        let a = SparseVector::from_pairs(4, vec![(0, 1.0), (2, 3.0)]).unwrap();
        let b = SparseVector::from_pairs(4, vec![(2, 2.0), (3, 4.0)]).unwrap();
        assert_eq!(a.dot(&b), 6.0);
        let sum = a.add(&b);
        assert_eq!(sum.get(0), 1.0);
        assert_eq!(sum.get(2), 5.0);
        assert_eq!(sum.get(3), 4.0);
    }

    #[test]
    fn max_violation_is_worst_negative_component() {
        let v = SparseVector::from_pairs(3, vec![(0, 1.0), (1, -2.5), (2, -0.1)]).unwrap();
        assert_eq!(v.max_violation(), 2.5);
    }

    #[test]
    fn dense_round_trip_drops_entries_below_tolerance() {
        let v = SparseVector::from_pairs(3, vec![(0, 1.0), (2, -3.0)]).unwrap();
        let dense = v.to_dense();
        let back = SparseVector::from_dense(&dense, 1e-9);
        assert_eq!(v, back);
    }
}
