//! Conversion of caller-supplied labels into the one-hot form the attack works with.
use crate::error::{AttackError, ConfigurationError};
use crate::util::argmax_rows;
use crate::AdvFloat;
use ndarray::{Array1, Array2, ArrayView2};

#[derive(Clone, Debug, PartialEq)]
pub enum Labels {
    /// One class index per sample.
    Indices(Array1<usize>),
    /// One row per sample, `nb_classes` columns.
    OneHot(Array2<AdvFloat>),
}

impl Labels {
    /// Canonical `(batch, nb_classes)` one-hot array.
    ///
    /// # Errors
    /// A single-column one-hot array for a two-class model is unsupported; any other
    /// shape or index mismatch is a configuration error.
    pub fn to_one_hot(&self, nb_classes: usize) -> Result<Array2<AdvFloat>, AttackError> {
        match self {
            Self::Indices(idxs) => {
                let mut one_hot = Array2::zeros((idxs.len(), nb_classes));
                for (row, &label) in idxs.iter().enumerate() {
                    if label >= nb_classes {
                        return Err(ConfigurationError::LabelOutOfRange { label, nb_classes }.into());
                    }
                    one_hot[[row, label]] = 1.;
                }
                Ok(one_hot)
            }
            Self::OneHot(rows) if nb_classes == 2 && rows.ncols() == 1 => {
                Err(AttackError::UnsupportedConfiguration(
                    "binary classification with a single output is not supported".to_string(),
                ))
            }
            Self::OneHot(rows) if rows.ncols() != nb_classes => Err(ConfigurationError::LabelShape {
                expected: vec![rows.nrows(), nb_classes],
                got: rows.shape().to_vec(),
            }
            .into()),
            Self::OneHot(rows) => Ok(rows.clone()),
        }
    }
}

impl From<Array1<usize>> for Labels {
    fn from(idxs: Array1<usize>) -> Self {
        Self::Indices(idxs)
    }
}

impl From<Array2<AdvFloat>> for Labels {
    fn from(rows: Array2<AdvFloat>) -> Self {
        Self::OneHot(rows)
    }
}

/// One-hot labels of the arg-max class of every prediction row.
///
/// # Errors
pub fn from_predictions(predictions: &ArrayView2<AdvFloat>) -> Result<Array2<AdvFloat>, AttackError> {
    let idxs = argmax_rows(predictions)?;
    Labels::Indices(idxs).to_one_hot(predictions.ncols())
}
