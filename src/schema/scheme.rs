//! Scheme tags selecting the network variant and the pluggable strategies.
//!
//! Each tag has a stable numeric code used in the binary parameter header and
//! a kebab-case name used on the command line and in JSON configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error for unknown scheme names or codes.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemeError {
    #[error("Unknown {kind} scheme '{name}'")]
    UnknownName { kind: &'static str, name: String },
    #[error("Unknown {kind} scheme code {code}")]
    UnknownCode { kind: &'static str, code: u16 },
}

/// Which kind of network is evolved, and therefore which stop criterion applies.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum NetworkType {
    /// Evolve for function only (flow error below threshold).
    #[default]
    Flow,
    /// Evolve for function, then for robustness against link removal.
    LinkRobust,
    /// Evolve for function, then for robustness against node removal.
    NodeRobust,
    /// Evolve for function, then for robustness against weight noise.
    NoiseRobust {
        /// Noise intensity in [0, 1).
        noise_level: f64,
    },
}

impl NetworkType {
    /// Numeric code stored in the parameter header.
    pub fn code(&self) -> u16 {
        match self {
            Self::Flow => 0,
            Self::LinkRobust => 1,
            Self::NodeRobust => 2,
            Self::NoiseRobust { .. } => 3,
        }
    }

    /// Rebuild from a header code. The noise level is stored separately.
    pub fn from_code(code: u16, noise_level: f64) -> Result<Self, SchemeError> {
        match code {
            0 => Ok(Self::Flow),
            1 => Ok(Self::LinkRobust),
            2 => Ok(Self::NodeRobust),
            3 => Ok(Self::NoiseRobust { noise_level }),
            _ => Err(SchemeError::UnknownCode {
                kind: "network type",
                code,
            }),
        }
    }

    /// True for every variant that tracks a robustness score.
    #[inline]
    pub fn is_robust(&self) -> bool {
        !matches!(self, Self::Flow)
    }

    /// Noise level for the noise-robust variant.
    pub fn noise_level(&self) -> Option<f64> {
        match self {
            Self::NoiseRobust { noise_level } => Some(*noise_level),
            _ => None,
        }
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flow => write!(f, "flow"),
            Self::LinkRobust => write!(f, "link-robust"),
            Self::NodeRobust => write!(f, "node-robust"),
            Self::NoiseRobust { noise_level } => write!(f, "noise-robust={}", noise_level),
        }
    }
}

/// How the initial topology is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NetworkInit {
    /// Bernoulli wiring of every legal pair with probability `connectivity`.
    #[default]
    Random,
    /// Edges read from an external edge list.
    Fixed,
}

/// How the ideal output pattern is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PatternInit {
    /// `k` random rows per column with random normalized weights.
    #[default]
    Random,
    /// Random patterns resampled until the complexity lies within bounds.
    Complexity,
    /// One dominant weight per column, rows shifted to minimise overlap.
    HighComplexity,
    /// One dominant weight per column, same rows for every column.
    LowComplexity,
    /// Equal weights on the same rows for every column.
    EqualComplexity,
    /// Equal weights on a row window shifted by one per column.
    #[serde(alias = "equal-spread-complexity")]
    EqualSpread,
}

/// How a candidate topology is perturbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MutationScheme {
    /// Toggle a single legal link.
    Link,
    /// Add or remove a whole input-to-output path.
    #[default]
    Path,
}

macro_rules! string_scheme {
    ($ty:ty, $kind:literal, [$(($variant:path, $name:literal, $code:literal)),+ $(,)?]) => {
        impl $ty {
            /// Numeric code stored in the parameter header.
            pub fn code(&self) -> u16 {
                match self {
                    $($variant => $code,)+
                }
            }

            /// Rebuild from a header code.
            pub fn from_code(code: u16) -> Result<Self, SchemeError> {
                match code {
                    $($code => Ok($variant),)+
                    _ => Err(SchemeError::UnknownCode { kind: $kind, code }),
                }
            }

            /// Name used on the command line.
            pub fn name(&self) -> &'static str {
                match self {
                    $($variant => $name,)+
                }
            }
        }

        impl FromStr for $ty {
            type Err = SchemeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok($variant),)+
                    _ => Err(SchemeError::UnknownName {
                        kind: $kind,
                        name: s.to_string(),
                    }),
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

string_scheme!(
    NetworkInit,
    "network initialisation",
    [(NetworkInit::Random, "random", 0), (NetworkInit::Fixed, "fixed", 1)]
);

string_scheme!(
    PatternInit,
    "pattern initialisation",
    [
        (PatternInit::Random, "random", 0),
        (PatternInit::Complexity, "complexity", 1),
        (PatternInit::HighComplexity, "high-complexity", 2),
        (PatternInit::LowComplexity, "low-complexity", 3),
        (PatternInit::EqualComplexity, "equal-complexity", 4),
        (PatternInit::EqualSpread, "equal-spread", 5),
    ]
);

string_scheme!(
    MutationScheme,
    "mutation",
    [(MutationScheme::Link, "link", 0), (MutationScheme::Path, "path", 1)]
);
