//! The oracle interface an attack needs from a model.
use crate::error::ClassifierError;
use crate::loss::{LogitLoss, LossKind};
use crate::AdvFloat;
use ndarray::{concatenate, Array2, ArrayD, ArrayView2, ArrayViewD, Axis};
use serde::{Deserialize, Serialize};

/// Valid range of every input coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct ClipValues {
    pub min: AdvFloat,
    pub max: AdvFloat,
}

impl ClipValues {
    pub const fn new(min: AdvFloat, max: AdvFloat) -> Self {
        Self { min, max }
    }

    pub fn clip(&self, x: &mut ArrayD<AdvFloat>) {
        x.mapv_inplace(|v| v.max(self.min).min(self.max));
    }

    pub fn contains(&self, x: &ArrayViewD<AdvFloat>) -> bool {
        x.iter().all(|v| (self.min..=self.max).contains(v))
    }
}

impl Default for ClipValues {
    fn default() -> Self {
        Self::new(0., 1.)
    }
}

/// A differentiable classifier treated as an opaque, stateless oracle.
///
/// Inputs carry the batch on axis 0 followed by [`Classifier::input_shape`].
/// Implementations must return raw logits from [`Classifier::predict`]; both loss kinds
/// are defined on logits.
pub trait Classifier {
    fn input_shape(&self) -> &[usize];

    fn nb_classes(&self) -> usize;

    fn clip_values(&self) -> ClipValues {
        ClipValues::default()
    }

    /// # Errors
    fn predict(&self, x: &ArrayViewD<AdvFloat>) -> Result<Array2<AdvFloat>, ClassifierError>;

    /// Pulls a cotangent on the logits back to the inputs.
    ///
    /// # Errors
    fn backward(
        &self,
        x: &ArrayViewD<AdvFloat>,
        grad_logits: &ArrayView2<AdvFloat>,
    ) -> Result<ArrayD<AdvFloat>, ClassifierError>;

    /// Gradient of `loss` w.r.t. the inputs, for one-hot `labels`.
    ///
    /// # Errors
    fn loss_gradient(
        &self,
        x: &ArrayViewD<AdvFloat>,
        labels: &ArrayView2<AdvFloat>,
        loss: &LossKind,
    ) -> Result<ArrayD<AdvFloat>, ClassifierError> {
        let logits = self.predict(x)?;
        let grad_logits = loss.logit_gradient(&logits.view(), labels);
        self.backward(x, &grad_logits.view())
    }

    /// # Errors
    fn predict_batched(
        &self,
        x: &ArrayViewD<AdvFloat>,
        batch_size: usize,
    ) -> Result<Array2<AdvFloat>, ClassifierError> {
        let outputs = x
            .axis_chunks_iter(Axis(0), batch_size.max(1))
            .map(|chunk| self.predict(&chunk))
            .collect::<Result<Vec<_>, _>>()?;
        if outputs.is_empty() {
            return Ok(Array2::zeros((0, self.nb_classes())));
        }
        let views = outputs.iter().map(Array2::view).collect::<Vec<_>>();
        concatenate(Axis(0), &views).map_err(|e| ClassifierError::Backend(e.to_string()))
    }
}
