use crate::affine::Affine2;
use crate::dnn::layer::Layer;
use crate::AdvFloat;
use ndarray::Array2;
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Dense {
    aff: Affine2,
}

impl Dense {
    pub const fn new(aff: Affine2) -> Self {
        Self { aff }
    }
}

#[typetag::serde]
impl Layer for Dense {
    fn input_dim(&self) -> usize {
        self.aff.input_dim()
    }

    fn output_dim(&self) -> usize {
        self.aff.output_dim()
    }

    fn forward2(&self, input: &ArrayView2<AdvFloat>) -> Array2<AdvFloat> {
        debug_assert_eq!(input.ncols(), self.input_dim());
        self.aff.apply_rows(input)
    }

    fn backward2(
        &self,
        _input: &ArrayView2<AdvFloat>,
        grad_output: &ArrayView2<AdvFloat>,
    ) -> Array2<AdvFloat> {
        self.aff.pull_back_rows(grad_output)
    }
}

impl fmt::Display for Dense {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Dense {}", self.aff.output_dim())
    }
}
