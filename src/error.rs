use crate::loss::LossKind;
use crate::AdvFloat;
use std::fmt;

/// The attack was asked to do something it cannot do with the given inputs.
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigurationError {
    MissingTargetLabels,
    UnknownLossType(String),
    ProbabilityOutput {
        loss_type: LossKind,
    },
    TooFewClasses {
        loss_type: LossKind,
        nb_classes: usize,
    },
    InvalidParameter {
        name: &'static str,
        reason: String,
    },
    LabelShape {
        expected: Vec<usize>,
        got: Vec<usize>,
    },
    LabelOutOfRange {
        label: usize,
        nb_classes: usize,
    },
    InputShape {
        expected: Vec<usize>,
        got: Vec<usize>,
    },
    InputOutOfRange {
        min: AdvFloat,
        max: AdvFloat,
    },
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::MissingTargetLabels => {
                write!(f, "target labels must be provided for a targeted attack")
            }
            Self::UnknownLossType(name) => write!(f, "unsupported loss type `{}`", name),
            Self::ProbabilityOutput { loss_type } => write!(
                f,
                "the classifier seems to predict probabilities; loss type `{}` requires logits",
                loss_type
            ),
            Self::TooFewClasses {
                loss_type,
                nb_classes,
            } => write!(
                f,
                "loss type `{}` is undefined for {} classes",
                loss_type, nb_classes
            ),
            Self::InvalidParameter { name, reason } => {
                write!(f, "invalid value for `{}`: {}", name, reason)
            }
            Self::LabelShape { expected, got } => write!(
                f,
                "labels have shape {:?}, expected {:?}",
                got, expected
            ),
            Self::LabelOutOfRange { label, nb_classes } => write!(
                f,
                "label {} is out of range for {} classes",
                label, nb_classes
            ),
            Self::InputShape { expected, got } => {
                write!(f, "inputs have shape {:?}, expected {:?}", got, expected)
            }
            Self::InputOutOfRange { min, max } => {
                write!(f, "inputs must lie in the clip range [{}, {}]", min, max)
            }
        }
    }
}

impl std::error::Error for ConfigurationError {}

/// Failure reported by the classifier backing an attack.
#[derive(Clone, Debug, PartialEq)]
pub enum ClassifierError {
    ShapeMismatch { expected: Vec<usize>, got: Vec<usize> },
    Backend(String),
}

impl fmt::Display for ClassifierError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::ShapeMismatch { expected, got } => write!(
                f,
                "classifier received shape {:?}, expected {:?}",
                got, expected
            ),
            Self::Backend(msg) => write!(f, "classifier backend error: {}", msg),
        }
    }
}

impl std::error::Error for ClassifierError {}

#[derive(Clone, Debug, PartialEq)]
pub enum AttackError {
    Configuration(ConfigurationError),
    /// Combinations the attack has never been validated on, e.g. single-logit binary models.
    UnsupportedConfiguration(String),
    Classifier(ClassifierError),
}

impl AttackError {
    pub const fn is_configuration_error(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

impl fmt::Display for AttackError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Configuration(err) => write!(f, "configuration error: {}", err),
            Self::UnsupportedConfiguration(msg) => write!(f, "unsupported configuration: {}", msg),
            Self::Classifier(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for AttackError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Configuration(err) => Some(err),
            Self::Classifier(err) => Some(err),
            Self::UnsupportedConfiguration(_) => None,
        }
    }
}

impl From<ConfigurationError> for AttackError {
    fn from(err: ConfigurationError) -> Self {
        Self::Configuration(err)
    }
}

impl From<ClassifierError> for AttackError {
    fn from(err: ClassifierError) -> Self {
        Self::Classifier(err)
    }
}
