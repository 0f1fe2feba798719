//! Uncertainty modes and their capabilities.
//!
//! The mode selects how the model represents predictive uncertainty and
//! drives two behavioral switches in the training loop: whether a variance
//! head exists at all, and whether evaluation flips the model into eval
//! mode. Both are expressed as capabilities here so no caller branches on
//! mode names.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the model represents predictive uncertainty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Uncertainty {
    /// Plain regression, mean head only.
    #[default]
    Normal,
    /// Learned per-pixel variance head trained with a Gaussian NLL.
    Aleatoric,
    /// Model uncertainty estimated by sampling at evaluation time.
    Epistemic,
    /// Aleatoric head plus epistemic sampling.
    Combined,
}

impl Uncertainty {
    /// Whether the model carries a variance head whose output is reported.
    pub fn supports_variance(self) -> bool {
        self != Self::Normal
    }

    /// Whether evaluation switches the model into eval mode.
    ///
    /// Epistemic-style variants keep their mode unchanged so that sampling
    /// layers stay active during evaluation.
    pub fn eval_during_test(self) -> bool {
        matches!(self, Self::Aleatoric | Self::Normal)
    }

    /// Lowercase name, matching the serialized form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Aleatoric => "aleatoric",
            Self::Epistemic => "epistemic",
            Self::Combined => "combined",
        }
    }
}

impl fmt::Display for Uncertainty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Uncertainty {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(Self::Normal),
            "aleatoric" => Ok(Self::Aleatoric),
            "epistemic" => Ok(Self::Epistemic),
            "combined" => Ok(Self::Combined),
            other => Err(Error::Config {
                field: "uncertainty".into(),
                message: format!(
                    "unknown mode '{other}' (expected normal, aleatoric, epistemic, or combined)"
                ),
            }),
        }
    }
}
