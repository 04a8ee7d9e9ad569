//! Scalar losses over logits that drive the attack's gradient queries.
//!
//! Both losses are mean-reduced over the batch, so the gradient handed back to a
//! [`Classifier`](crate::classifier::Classifier) is already divided by the batch size.
use crate::error::ConfigurationError;
use crate::AdvFloat;
use enum_dispatch::enum_dispatch;
use itertools::Itertools;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, Zip};
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;

const DLR_DENOMINATOR_FLOOR: AdvFloat = 1e-12;

#[enum_dispatch]
pub trait LogitLoss {
    fn name(&self) -> &'static str;

    /// Smallest number of classes the loss is defined for.
    fn min_classes(&self) -> usize {
        2
    }

    /// Per-sample loss values.
    fn value(&self, logits: &ArrayView2<AdvFloat>, labels: &ArrayView2<AdvFloat>) -> Array1<AdvFloat>;

    /// Gradient of the batch mean of [`LogitLoss::value`] w.r.t. the logits.
    fn logit_gradient(
        &self,
        logits: &ArrayView2<AdvFloat>,
        labels: &ArrayView2<AdvFloat>,
    ) -> Array2<AdvFloat>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CrossEntropy;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DifferenceLogitsRatio;

#[enum_dispatch(LogitLoss)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LossKind {
    CrossEntropy,
    DifferenceLogitsRatio,
}

impl LossKind {
    pub const fn cross_entropy() -> Self {
        Self::CrossEntropy(CrossEntropy)
    }

    pub const fn difference_logits_ratio() -> Self {
        Self::DifferenceLogitsRatio(DifferenceLogitsRatio)
    }
}

impl Default for LossKind {
    fn default() -> Self {
        Self::cross_entropy()
    }
}

impl FromStr for LossKind {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cross_entropy" => Ok(Self::cross_entropy()),
            "difference_logits_ratio" => Ok(Self::difference_logits_ratio()),
            other => Err(ConfigurationError::UnknownLossType(other.to_string())),
        }
    }
}

impl TryFrom<String> for LossKind {
    type Error = ConfigurationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<LossKind> for String {
    fn from(loss: LossKind) -> Self {
        loss.name().to_string()
    }
}

impl fmt::Display for LossKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

fn label_index(label: &ArrayView1<AdvFloat>) -> usize {
    label
        .iter()
        .enumerate()
        .fold((0, AdvFloat::NEG_INFINITY), |(best_idx, best), (idx, &v)| {
            if v > best {
                (idx, v)
            } else {
                (best_idx, best)
            }
        })
        .0
}

fn softmax(row: &ArrayView1<AdvFloat>) -> Array1<AdvFloat> {
    let max = row.fold(AdvFloat::NEG_INFINITY, |acc, &x| acc.max(x));
    let exps = row.mapv(|x| (x - max).exp());
    let total = exps.sum();
    exps / total
}

impl LogitLoss for CrossEntropy {
    fn name(&self) -> &'static str {
        "cross_entropy"
    }

    fn value(&self, logits: &ArrayView2<AdvFloat>, labels: &ArrayView2<AdvFloat>) -> Array1<AdvFloat> {
        Zip::from(logits.rows())
            .and(labels.rows())
            .map_collect(|z, y| {
                let max = z.fold(AdvFloat::NEG_INFINITY, |acc, &x| acc.max(x));
                let log_sum_exp = max + z.mapv(|x| (x - max).exp()).sum().ln();
                log_sum_exp - z[label_index(&y)]
            })
    }

    fn logit_gradient(
        &self,
        logits: &ArrayView2<AdvFloat>,
        labels: &ArrayView2<AdvFloat>,
    ) -> Array2<AdvFloat> {
        let n = logits.nrows().max(1) as AdvFloat;
        let mut grad = Array2::zeros(logits.raw_dim());
        Zip::from(grad.rows_mut())
            .and(logits.rows())
            .and(labels.rows())
            .for_each(|mut g, z, y| {
                g.assign(&softmax(&z));
                g[label_index(&y)] -= 1.;
                g /= n;
            });
        grad
    }
}

/// Indices of the true class, the strongest competing class, and the first and third
/// largest logits of a row.
fn dlr_indices(z: &ArrayView1<AdvFloat>, y: &ArrayView1<AdvFloat>) -> (usize, usize, usize, usize) {
    let order: Vec<usize> = (0..z.len())
        .sorted_by(|&a, &b| z[b].total_cmp(&z[a]))
        .collect();
    let true_idx = label_index(y);
    let competitor = if order[0] == true_idx { order[1] } else { order[0] };
    (true_idx, competitor, order[0], order[2])
}

impl LogitLoss for DifferenceLogitsRatio {
    fn name(&self) -> &'static str {
        "difference_logits_ratio"
    }

    fn min_classes(&self) -> usize {
        3
    }

    fn value(&self, logits: &ArrayView2<AdvFloat>, labels: &ArrayView2<AdvFloat>) -> Array1<AdvFloat> {
        Zip::from(logits.rows())
            .and(labels.rows())
            .map_collect(|z, y| {
                let (true_idx, competitor, first, third) = dlr_indices(&z, &y);
                let den = (z[first] - z[third]).max(DLR_DENOMINATOR_FLOOR);
                -(z[true_idx] - z[competitor]) / den
            })
    }

    fn logit_gradient(
        &self,
        logits: &ArrayView2<AdvFloat>,
        labels: &ArrayView2<AdvFloat>,
    ) -> Array2<AdvFloat> {
        let n = logits.nrows().max(1) as AdvFloat;
        let mut grad = Array2::zeros(logits.raw_dim());
        for (mut g, (z, y)) in grad
            .axis_iter_mut(Axis(0))
            .zip(logits.rows().into_iter().zip(labels.rows()))
        {
            let (true_idx, competitor, first, third) = dlr_indices(&z, &y);
            let num = z[true_idx] - z[competitor];
            let den = (z[first] - z[third]).max(DLR_DENOMINATOR_FLOOR);
            g[true_idx] -= 1. / den;
            g[competitor] += 1. / den;
            g[first] += num / (den * den);
            g[third] -= num / (den * den);
            g /= n;
        }
        grad
    }
}
