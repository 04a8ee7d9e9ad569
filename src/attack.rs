//! Entry point: batching, label handling and reporting around [`BatchAttack`].
use crate::classifier::Classifier;
use crate::config::AttackConfig;
use crate::driver::{BatchAttack, BestRecord};
use crate::error::{AttackError, ClassifierError, ConfigurationError};
use crate::labels::{from_predictions, Labels};
use crate::loss::LogitLoss;
use crate::util::{compute_success, is_probability};
use crate::AdvFloat;
use log::{info, warn};
use ndarray::{concatenate, ArrayD, ArrayView2, ArrayViewD, Axis, IxDyn};
use serde::{Deserialize, Serialize};

/// Outcome of [`ExpAttackL1::generate_with_report`].
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct AttackReport {
    pub adversarials: ArrayD<AdvFloat>,
    /// L1 distance of every sample's best perturbation, `None` where the attack failed.
    pub distances: Vec<Option<AdvFloat>>,
    pub labels: Vec<Option<usize>>,
    pub success_rate: AdvFloat,
}

/// Exponentiated-gradient attack under an L1 budget.
///
/// The classifier is queried as a stateless oracle and must predict logits.
#[derive(Debug)]
pub struct ExpAttackL1<'a, C: Classifier + ?Sized> {
    classifier: &'a C,
    config: AttackConfig,
}

impl<'a, C: Classifier + ?Sized> ExpAttackL1<'a, C> {
    /// Checks `config` and probes `classifier` once on an all-ones input.
    ///
    /// # Errors
    /// An invalid configuration, a classifier predicting probabilities, a single-logit
    /// binary classifier, or too few classes for the chosen loss
    pub fn new(classifier: &'a C, config: AttackConfig) -> Result<Self, AttackError> {
        config.validate()?;
        if config.confidence != 0. {
            warn!(
                "confidence {} has no effect on ExpAttackL1 and is ignored",
                config.confidence
            );
        }

        let mut probe_shape = vec![1];
        probe_shape.extend_from_slice(classifier.input_shape());
        let probe = classifier.predict(&ArrayD::ones(IxDyn(&probe_shape)).view())?;
        let nb_classes = classifier.nb_classes();
        if probe.ncols() == 1 && nb_classes <= 2 {
            return Err(AttackError::UnsupportedConfiguration(
                "binary classification with a single output is not supported".to_string(),
            ));
        }
        if probe.ncols() != nb_classes {
            return Err(ClassifierError::ShapeMismatch {
                expected: vec![1, nb_classes],
                got: probe.shape().to_vec(),
            }
            .into());
        }
        if is_probability(&probe.view()) {
            return Err(ConfigurationError::ProbabilityOutput {
                loss_type: config.loss_type,
            }
            .into());
        }
        if nb_classes < config.loss_type.min_classes() {
            return Err(ConfigurationError::TooFewClasses {
                loss_type: config.loss_type,
                nb_classes,
            }
            .into());
        }
        Ok(Self { classifier, config })
    }

    pub const fn config(&self) -> &AttackConfig {
        &self.config
    }

    /// Adversarial examples for `x`, clipped to the classifier's valid range.
    ///
    /// `labels` are the targets of a targeted attack, or the true classes of an
    /// untargeted one; the latter default to the classifier's own predictions.
    ///
    /// # Errors
    /// See [`Self::generate_with_report`]
    pub fn generate(
        &self,
        x: &ArrayViewD<AdvFloat>,
        labels: Option<&Labels>,
    ) -> Result<ArrayD<AdvFloat>, AttackError> {
        self.generate_with_report(x, labels)
            .map(|report| report.adversarials)
    }

    /// # Errors
    /// Missing labels for a targeted attack, inputs or labels of the wrong shape, inputs
    /// outside the classifier's clip range, and any classifier failure. Nothing is returned for a partially attacked input.
    pub fn generate_with_report(
        &self,
        x: &ArrayViewD<AdvFloat>,
        labels: Option<&Labels>,
    ) -> Result<AttackReport, AttackError> {
        let config = &self.config;
        if config.targeted && labels.is_none() {
            return Err(ConfigurationError::MissingTargetLabels.into());
        }
        self.check_input(x)?;
        let n = x.shape()[0];
        let nb_classes = self.classifier.nb_classes();

        let labels = match labels {
            Some(labels) => {
                let one_hot = labels.to_one_hot(nb_classes)?;
                if one_hot.nrows() != n {
                    return Err(ConfigurationError::LabelShape {
                        expected: vec![n, nb_classes],
                        got: one_hot.shape().to_vec(),
                    }
                    .into());
                }
                one_hot
            }
            None => from_predictions(
                &self
                    .classifier
                    .predict_batched(x, config.batch_size)?
                    .view(),
            )?,
        };

        let nb_batches = (n + config.batch_size - 1) / config.batch_size;
        let mut pieces = Vec::with_capacity(nb_batches);
        let mut records: Vec<BestRecord> = Vec::with_capacity(n);
        for (batch_id, (x_batch, y_batch)) in x
            .axis_chunks_iter(Axis(0), config.batch_size)
            .zip(labels.axis_chunks_iter(Axis(0), config.batch_size))
            .enumerate()
        {
            let outcome = BatchAttack::new(self.classifier, config).run(&x_batch, &y_batch)?;
            if config.verbose {
                info!(
                    "ExpAttackL1 batch {}/{}: {} of {} samples adversarial",
                    batch_id + 1,
                    nb_batches,
                    outcome.records.iter().filter(|r| r.label.is_some()).count(),
                    outcome.records.len()
                );
            }
            pieces.push(outcome.adversarials);
            records.extend(outcome.records);
        }

        let mut adversarials = if pieces.is_empty() {
            x.to_owned()
        } else {
            let views = pieces.iter().map(ArrayD::view).collect::<Vec<_>>();
            concatenate(Axis(0), &views).map_err(|e| ClassifierError::Backend(e.to_string()))?
        };
        self.classifier.clip_values().clip(&mut adversarials);

        let success_rate = self.success_rate(x, &labels.view(), &adversarials.view())?;
        info!(
            "Success rate of ExpAttackL1 attack: {:.2}%",
            100. * success_rate
        );

        Ok(AttackReport {
            adversarials,
            distances: records
                .iter()
                .map(|r| r.label.map(|_| r.distance))
                .collect(),
            labels: records.iter().map(|r| r.label).collect(),
            success_rate,
        })
    }

    fn success_rate(
        &self,
        x: &ArrayViewD<AdvFloat>,
        labels: &ArrayView2<AdvFloat>,
        x_adv: &ArrayViewD<AdvFloat>,
    ) -> Result<AdvFloat, AttackError> {
        compute_success(
            self.classifier,
            x,
            labels,
            x_adv,
            self.config.targeted,
            self.config.batch_size,
        )
    }

    fn check_input(&self, x: &ArrayViewD<AdvFloat>) -> Result<(), ConfigurationError> {
        let input_shape = self.classifier.input_shape();
        if x.ndim() == 0 || x.shape()[1..] != *input_shape {
            let mut expected = vec![x.shape().first().copied().unwrap_or(0)];
            expected.extend_from_slice(input_shape);
            return Err(ConfigurationError::InputShape {
                expected,
                got: x.shape().to_vec(),
            });
        }
        let clip = self.classifier.clip_values();
        if !clip.contains(x) {
            return Err(ConfigurationError::InputOutOfRange {
                min: clip.min,
                max: clip.max,
            });
        }
        Ok(())
    }
}
