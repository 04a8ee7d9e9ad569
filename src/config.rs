//! Attack hyperparameters.
use crate::error::ConfigurationError;
use crate::loss::LossKind;
use crate::AdvFloat;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AttackConfig {
    /// Reserved. Accepted for compatibility, has no effect on the optimization.
    pub confidence: AdvFloat,
    /// Drive predictions towards the given labels instead of away from them.
    pub targeted: bool,
    pub learning_rate: AdvFloat,
    pub max_iter: usize,
    /// Smoothing of the mirror map. `None` uses `epsilon / dim` for each sample.
    pub beta: Option<AdvFloat>,
    /// L1 radius of the perturbation budget.
    pub epsilon: AdvFloat,
    pub batch_size: usize,
    /// Fraction of gradient entries zeroed on the first iteration.
    pub sparsity_init: AdvFloat,
    /// Iterations over which the sparsified fraction halves.
    pub sparsity_dec: AdvFloat,
    /// Log per-batch progress.
    pub verbose: bool,
    pub loss_type: LossKind,
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            confidence: 0.,
            targeted: false,
            learning_rate: 1.,
            max_iter: 100,
            beta: None,
            epsilon: 12.,
            batch_size: 1,
            sparsity_init: 0.9,
            sparsity_dec: 100.,
            verbose: true,
            loss_type: LossKind::default(),
        }
    }
}

impl AttackConfig {
    /// Reads a configuration from JSON. Missing fields take their default values.
    ///
    /// # Errors
    /// Malformed JSON, an unknown loss type, or a value rejected by [`Self::validate`]
    pub fn from_json(json: &str) -> Result<Self, ConfigurationError> {
        let malformed = |e: serde_json::Error| ConfigurationError::InvalidParameter {
            name: "config",
            reason: e.to_string(),
        };
        let value: serde_json::Value = serde_json::from_str(json).map_err(malformed)?;
        if let Some(name) = value.get("loss_type").and_then(serde_json::Value::as_str) {
            name.parse::<LossKind>()?;
        }
        let config: Self = serde_json::from_value(value).map_err(malformed)?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    /// The first parameter outside its admissible range
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        fn invalid(name: &'static str, reason: String) -> Result<(), ConfigurationError> {
            Err(ConfigurationError::InvalidParameter { name, reason })
        }
        if !(self.learning_rate > 0. && self.learning_rate.is_finite()) {
            return invalid(
                "learning_rate",
                format!("must be a positive number, got {}", self.learning_rate),
            );
        }
        if self.max_iter == 0 {
            return invalid("max_iter", "must be positive".to_string());
        }
        if let Some(beta) = self.beta {
            if !(beta > 0. && beta.is_finite()) {
                return invalid("beta", format!("must be a positive number, got {}", beta));
            }
        }
        if !(self.epsilon >= 0. && self.epsilon.is_finite()) {
            return invalid(
                "epsilon",
                format!("must be a non-negative number, got {}", self.epsilon),
            );
        }
        if self.batch_size == 0 {
            return invalid("batch_size", "must be positive".to_string());
        }
        if !(0. ..=1.).contains(&self.sparsity_init) {
            return invalid(
                "sparsity_init",
                format!("must lie in [0, 1], got {}", self.sparsity_init),
            );
        }
        if !(self.sparsity_dec > 0. && self.sparsity_dec.is_finite()) {
            return invalid(
                "sparsity_dec",
                format!("must be a positive number, got {}", self.sparsity_dec),
            );
        }
        Ok(())
    }
}
