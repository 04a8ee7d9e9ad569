//! The optimization loop over one batch of samples.
use crate::bounds::Bounds1;
use crate::classifier::Classifier;
use crate::config::AttackConfig;
use crate::error::{AttackError, ClassifierError};
use crate::mirror::{AdaptiveStepSize, MirrorDescent};
use crate::util::{argmax_rows, flatten_batch, l1_norm, quantile, unflatten_batch};
use crate::AdvFloat;
use itertools::izip;
use log::debug;
use ndarray::{Array1, Array2, ArrayD, ArrayView1, ArrayView2, ArrayViewD, ArrayViewMut1, ShapeError};
use serde::{Deserialize, Serialize};

/// Smallest successful perturbation found so far for one sample.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct BestRecord {
    pub distance: AdvFloat,
    /// Predicted label at the best point; `None` until the attack first succeeds.
    pub label: Option<usize>,
    pub attack: Array1<AdvFloat>,
}

impl BestRecord {
    pub fn new(original: Array1<AdvFloat>) -> Self {
        Self {
            distance: AdvFloat::INFINITY,
            label: None,
            attack: original,
        }
    }

    /// Replaces the record if `candidate` succeeds at a strictly smaller distance.
    pub fn observe(
        &mut self,
        distance: AdvFloat,
        label: usize,
        candidate: &ArrayView1<AdvFloat>,
        success: bool,
    ) -> bool {
        if !(success && distance < self.distance) {
            return false;
        }
        self.distance = distance;
        self.label = Some(label);
        self.attack.assign(candidate);
        true
    }
}

/// Targeted attacks need the label to match the target, untargeted ones to differ
/// from the reference.
pub const fn is_success(label: usize, reference: usize, targeted: bool) -> bool {
    if targeted {
        label == reference
    } else {
        label != reference
    }
}

/// Fraction of smallest gradient entries dropped at iteration `iter`.
pub fn sparsity_quantile(init: AdvFloat, dec: AdvFloat, iter: usize) -> AdvFloat {
    init / (iter as AdvFloat / dec + 1.)
}

/// Zeroes every entry whose magnitude is below the `q`-quantile of magnitudes.
pub fn sparsify_gradient(grad: &mut ArrayViewMut1<AdvFloat>, q: AdvFloat) {
    let tol = quantile(grad.mapv(AdvFloat::abs).view(), q);
    grad.mapv_inplace(|g| if g.abs() < tol { 0. } else { g });
}

fn reshape_error(err: ShapeError) -> AttackError {
    ClassifierError::Backend(err.to_string()).into()
}

#[derive(Clone, Debug)]
pub struct BatchOutcome {
    /// Best attack of every sample, the original input where none succeeded.
    pub adversarials: ArrayD<AdvFloat>,
    pub records: Vec<BestRecord>,
}

/// Runs the mirror-descent attack on one batch.
///
/// Every sample has its own regret, perturbation box and sparsification threshold.
pub struct BatchAttack<'a, C: Classifier + ?Sized> {
    classifier: &'a C,
    config: &'a AttackConfig,
}

impl<'a, C: Classifier + ?Sized> BatchAttack<'a, C> {
    pub const fn new(classifier: &'a C, config: &'a AttackConfig) -> Self {
        Self { classifier, config }
    }

    /// # Errors
    /// Any failure of the classifier
    pub fn run(
        &self,
        x_batch: &ArrayViewD<AdvFloat>,
        labels: &ArrayView2<AdvFloat>,
    ) -> Result<BatchOutcome, AttackError> {
        self.run_observed(x_batch, labels, |_, _| {})
    }

    /// Like [`Self::run`], calling `observer` with the records after every iteration.
    ///
    /// # Errors
    /// Any failure of the classifier
    pub fn run_observed<F: FnMut(usize, &[BestRecord])>(
        &self,
        x_batch: &ArrayViewD<AdvFloat>,
        labels: &ArrayView2<AdvFloat>,
        mut observer: F,
    ) -> Result<BatchOutcome, AttackError> {
        let config = self.config;
        let shape = x_batch.shape().to_vec();
        let x0 = flatten_batch(x_batch).map_err(reshape_error)?;
        let (n, dim) = x0.dim();
        debug_assert_eq!(labels.nrows(), n);

        let clip = self.classifier.clip_values();
        let bounds: Vec<Bounds1> = x0
            .rows()
            .into_iter()
            .map(|row| Bounds1::perturbation_box(&row, clip))
            .collect();
        let mut trackers = vec![AdaptiveStepSize::new(config.learning_rate); n];
        let beta = config
            .beta
            .unwrap_or(config.epsilon / dim.max(1) as AdvFloat);
        let step = MirrorDescent::new(config.epsilon, beta);
        let reference = argmax_rows(labels)?;
        // Untargeted attacks ascend the loss, targeted ones descend it.
        let direction = if config.targeted { 1. } else { -1. };

        let mut delta = Array2::<AdvFloat>::zeros((n, dim));
        let mut records: Vec<BestRecord> = x0
            .rows()
            .into_iter()
            .map(|row| BestRecord::new(row.to_owned()))
            .collect();

        for iter in 0..config.max_iter {
            debug!("Iteration step {} out of {}", iter, config.max_iter);
            let x_adv = unflatten_batch(&x0 + &delta, &shape).map_err(reshape_error)?;
            let loss_grad =
                self.classifier
                    .loss_gradient(&x_adv.view(), labels, &config.loss_type)?;
            let mut grad = flatten_batch(&loss_grad.view()).map_err(reshape_error)? * direction;

            let q = sparsity_quantile(config.sparsity_init, config.sparsity_dec, iter);
            for mut row in grad.rows_mut() {
                sparsify_gradient(&mut row, q);
            }
            for (mut d, g, b, tracker) in izip!(delta.rows_mut(), grad.rows(), &bounds, &mut trackers) {
                let next = step.step(&g, &d.view(), b, tracker);
                d.assign(&next);
            }

            let x_adv = &x0 + &delta;
            let predictions = self
                .classifier
                .predict(&unflatten_batch(x_adv.clone(), &shape).map_err(reshape_error)?.view())?;
            let labels_adv = argmax_rows(&predictions.view())?;
            for (record, candidate, d, &label, &target) in izip!(
                &mut records,
                x_adv.rows(),
                delta.rows(),
                &labels_adv,
                &reference
            ) {
                record.observe(
                    l1_norm(d),
                    label,
                    &candidate,
                    is_success(label, target, config.targeted),
                );
            }
            debug!(
                "Iteration {}: {} of {} samples adversarial",
                iter,
                records.iter().filter(|r| r.label.is_some()).count(),
                n
            );
            observer(iter, &records);
        }

        let mut best = Array2::zeros((n, dim));
        for (mut row, record) in best.rows_mut().into_iter().zip(&records) {
            row.assign(&record.attack);
        }
        Ok(BatchOutcome {
            adversarials: unflatten_batch(best, &shape).map_err(reshape_error)?,
            records,
        })
    }
}
