use crate::dnn::layer::Layer;
use crate::AdvFloat;
use ndarray::{Array2, ArrayView2, Axis, Zip};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result};

/// Row-wise softmax. A network ending in this layer predicts probabilities, not logits.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Softmax {
    ndims: usize,
}

impl Softmax {
    pub const fn new(ndims: usize) -> Self {
        Self { ndims }
    }
}

impl Display for Softmax {
    fn fmt(&self, f: &mut Formatter) -> Result {
        write!(f, "Softmax")
    }
}

#[typetag::serde]
impl Layer for Softmax {
    fn input_dim(&self) -> usize {
        self.ndims
    }

    fn forward2(&self, input: &ArrayView2<AdvFloat>) -> Array2<AdvFloat> {
        let mut out = input.to_owned();
        for mut row in out.axis_iter_mut(Axis(0)) {
            let max = row.fold(AdvFloat::NEG_INFINITY, |acc, &x| acc.max(x));
            row.mapv_inplace(|x| (x - max).exp());
            let total = row.sum();
            row /= total;
        }
        out
    }

    fn backward2(
        &self,
        input: &ArrayView2<AdvFloat>,
        grad_output: &ArrayView2<AdvFloat>,
    ) -> Array2<AdvFloat> {
        let probs = self.forward2(input);
        let mut grad = Array2::zeros(input.raw_dim());
        Zip::from(grad.rows_mut())
            .and(probs.rows())
            .and(grad_output.rows())
            .for_each(|mut g, p, g_out| {
                let inner = p.dot(&g_out);
                g.assign(&(&p * &(&g_out - inner)));
            });
        grad
    }
}
