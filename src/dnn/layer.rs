use crate::AdvFloat;
use dyn_clone::DynClone;
use ndarray::{Array2, ArrayView2};
use std::fmt::{Debug, Display};

/// A differentiable layer acting on row-batched representations `(batch, features)`.
///
/// Layers may not be stateful. I.e., they must deterministically produce identical outputs
/// from identical inputs.
#[typetag::serde(tag = "type")]
pub trait Layer: DynClone + Display + Debug + Send + Sync {
    fn input_dim(&self) -> usize;

    fn output_dim(&self) -> usize {
        self.input_dim()
    }

    fn forward2(&self, input: &ArrayView2<AdvFloat>) -> Array2<AdvFloat>;

    /// Gradient w.r.t. `input` given the gradient w.r.t. this layer's output at `input`.
    fn backward2(
        &self,
        input: &ArrayView2<AdvFloat>,
        grad_output: &ArrayView2<AdvFloat>,
    ) -> Array2<AdvFloat>;
}

// This implements `Clone` for the trait
dyn_clone::clone_trait_object!(Layer);
