#![allow(clippy::module_name_repetitions)]
//! Representation of affine transformations
use crate::AdvFloat;
use ndarray::{Array1, Array2, ArrayView2};
use serde::{Deserialize, Serialize};

/// Affine map `f(x) = Ax + b`
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Affine2 {
    basis: Array2<AdvFloat>,
    shift: Array1<AdvFloat>,
}

impl Affine2 {
    /// # Panics
    /// If improper shapes are passed in
    pub fn new(basis: Array2<AdvFloat>, shift: Array1<AdvFloat>) -> Self {
        debug_assert_eq!(basis.shape()[0], shift.len());
        Self { basis, shift }
    }

    pub fn input_dim(&self) -> usize {
        self.basis.shape()[1]
    }

    pub fn output_dim(&self) -> usize {
        self.shift.len()
    }

    /// Applies the map to every row of `x`.
    pub fn apply_rows(&self, x: &ArrayView2<AdvFloat>) -> Array2<AdvFloat> {
        x.dot(&self.basis.t()) + &self.shift
    }

    /// Transpose-Jacobian product for row-batched cotangents.
    pub fn pull_back_rows(&self, grad: &ArrayView2<AdvFloat>) -> Array2<AdvFloat> {
        grad.dot(&self.basis)
    }
}
