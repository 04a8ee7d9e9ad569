#![allow(clippy::must_use_candidate, clippy::module_name_repetitions)]
//! Exponentiated-gradient adversarial attacks under an L1 budget.
//!
//! The attack runs mirror descent in a log-space dual, projects every iterate back onto
//! the intersection of an L1 ball and the classifier's valid input box, and adapts its
//! step size from an accumulated regret statistic. See [`attack::ExpAttackL1`] for the
//! entry point.
extern crate ndarray;
extern crate ndarray_stats;

pub mod affine;
pub mod attack;
pub mod bounds;
pub mod classifier;
pub mod config;
pub mod dnn;
pub mod driver;
pub mod error;
pub mod labels;
pub mod logging;
pub mod loss;
pub mod mirror;
pub mod projection;
pub mod util;

#[cfg(test)]
mod test_util;

pub type AdvFloat = f64;

pub use attack::{AttackReport, ExpAttackL1};
pub use classifier::{Classifier, ClipValues};
pub use config::AttackConfig;
pub use error::{AttackError, ClassifierError, ConfigurationError};
pub use labels::Labels;
pub use loss::LossKind;
