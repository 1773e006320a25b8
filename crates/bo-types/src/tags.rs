//! Experiment tags encoded in run names, e.g. `2UHF_ICM1_ELCB3_exp4`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Flags parsed out of an experiment name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExperimentTags {
    /// `basic`: single-fidelity baseline run.
    pub baseline: bool,
    /// `ICM`, with its numeric variant when one follows the tag.
    pub icm: Option<Option<u32>>,
    /// `ELCB<n>`: multi-fidelity acquisition approach.
    pub elcb: Option<u32>,
    /// `UHF`: ultra-high fidelity is the target source.
    pub uhf: bool,
}

impl ExperimentTags {
    pub fn parse(name: &str) -> Self {
        Self {
            baseline: name.contains("basic"),
            icm: name.find("ICM").map(|pos| leading_number(&name[pos + 3..])),
            elcb: name
                .find("ELCB")
                .and_then(|pos| leading_number(&name[pos + 4..])),
            uhf: name.contains("UHF"),
        }
    }

    pub fn setup(&self) -> Setup {
        if self.baseline {
            Setup::Baseline
        } else {
            match self.icm {
                Some(Some(1)) => Setup::LowToUltraHigh,
                Some(Some(2)) => Setup::HighToUltraHigh,
                _ => Setup::Unknown,
            }
        }
    }

    pub fn strategy(&self) -> Strategy {
        if self.baseline {
            Strategy::SingleFidelity
        } else {
            match self.elcb {
                Some(n) => Strategy::MfboApproach(n),
                None => Strategy::Unknown,
            }
        }
    }
}

fn leading_number(s: &str) -> Option<u32> {
    let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Which sources a multi-task run transfers between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Setup {
    Baseline,
    LowToUltraHigh,
    HighToUltraHigh,
    Unknown,
}

impl fmt::Display for Setup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Baseline => write!(f, "Baseline"),
            Self::LowToUltraHigh => write!(f, "LF -> UHF"),
            Self::HighToUltraHigh => write!(f, "HF -> UHF"),
            Self::Unknown => write!(f, "0"),
        }
    }
}

/// Acquisition strategy of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Strategy {
    SingleFidelity,
    MfboApproach(u32),
    Unknown,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SingleFidelity => write!(f, "Single fidelity"),
            Self::MfboApproach(n) => write!(f, "MFBO approach {n}"),
            Self::Unknown => write!(f, "0"),
        }
    }
}
