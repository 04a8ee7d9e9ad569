//! Utility functions
use crate::classifier::Classifier;
use crate::error::{AttackError, ClassifierError};
use crate::AdvFloat;
use approx::abs_diff_eq;
use ndarray::{Array1, Array2, ArrayD, ArrayView1, ArrayView2, ArrayViewD, IxDyn, ShapeError, Zip};
use ndarray_stats::interpolate::Linear;
use ndarray_stats::{Quantile1dExt, QuantileExt};
use noisy_float::types::n64;
use ordered_float::OrderedFloat;

pub fn l1_norm(x: ArrayView1<AdvFloat>) -> AdvFloat {
    x.fold(0., |acc, &v| acc + v.abs())
}

pub fn linf_norm(x: ArrayView1<AdvFloat>) -> AdvFloat {
    x.fold(0., |acc, &v| acc.max(v.abs()))
}

/// Sign with `sign(0) == 0`, unlike `f64::signum`.
pub fn sign(x: AdvFloat) -> AdvFloat {
    if x > 0. {
        1.
    } else if x < 0. {
        -1.
    } else {
        0.
    }
}

/// # Errors
/// If a row is empty or contains NaN
pub fn argmax_rows(x: &ArrayView2<AdvFloat>) -> Result<Array1<usize>, ClassifierError> {
    x.rows()
        .into_iter()
        .map(|row| {
            row.argmax()
                .map_err(|e| ClassifierError::Backend(format!("no argmax for predictions: {}", e)))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Array1::from)
}

/// Views a batch `(n, ...)` as `(n, dim)` rows in standard layout.
///
/// # Errors
pub fn flatten_batch(x: &ArrayViewD<AdvFloat>) -> Result<Array2<AdvFloat>, ShapeError> {
    let n = x.shape().first().copied().unwrap_or(0);
    let dim = x.shape().iter().skip(1).product::<usize>();
    x.as_standard_layout().into_owned().into_shape((n, dim))
}

/// Inverse of [`flatten_batch`] for a batch of the given full shape.
///
/// # Errors
pub fn unflatten_batch(x: Array2<AdvFloat>, shape: &[usize]) -> Result<ArrayD<AdvFloat>, ShapeError> {
    x.as_standard_layout().into_owned().into_shape(IxDyn(shape))
}

/// Whether every row looks like a categorical distribution.
pub fn is_probability(x: &ArrayView2<AdvFloat>) -> bool {
    let in_unit_range = x.iter().all(|&v| (0. ..=1.).contains(&v));
    in_unit_range
        && x
            .rows()
            .into_iter()
            .all(|row| abs_diff_eq!(row.sum(), 1., epsilon = 1e-3))
}

/// The `q`-quantile of `values`, interpolating linearly between order statistics.
/// `q` is clamped into `[0, 1]`; an empty input has quantile zero.
pub fn quantile(values: ArrayView1<AdvFloat>, q: AdvFloat) -> AdvFloat {
    let mut ordered = values.mapv(OrderedFloat);
    ordered
        .quantile_mut(n64(q.clamp(0., 1.)), &Linear)
        .map_or(0., OrderedFloat::into_inner)
}

/// Fraction of `x_adv` on which the attack currently succeeds.
///
/// Targeted attacks succeed when the adversarial prediction equals the label;
/// untargeted ones when it differs from the prediction on the clean input.
///
/// # Errors
pub fn compute_success<C: Classifier + ?Sized>(
    classifier: &C,
    x_clean: &ArrayViewD<AdvFloat>,
    labels: &ArrayView2<AdvFloat>,
    x_adv: &ArrayViewD<AdvFloat>,
    targeted: bool,
    batch_size: usize,
) -> Result<AdvFloat, AttackError> {
    let adv_preds = argmax_rows(&classifier.predict_batched(x_adv, batch_size)?.view())?;
    if adv_preds.is_empty() {
        return Ok(0.);
    }
    let reference = if targeted {
        argmax_rows(labels)?
    } else {
        argmax_rows(&classifier.predict_batched(x_clean, batch_size)?.view())?
    };
    let hits = Zip::from(&adv_preds)
        .and(&reference)
        .fold(0_usize, |acc, a, r| {
            if (a == r) == targeted {
                acc + 1
            } else {
                acc
            }
        });
    Ok(hits as AdvFloat / adv_preds.len() as AdvFloat)
}
