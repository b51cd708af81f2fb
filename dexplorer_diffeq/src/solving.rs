use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum SolvingTypeError {
    #[error("unknown solving type discriminant {0}")]
    UnknownDiscriminant(u8),
    #[error("unknown solving type name '{0}'")]
    UnknownName(String),
}

/// Integration method used to produce one trajectory.
///
/// `Analytical` is the reference every other method is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SolvingType {
    Analytical,
    ExplicitEuler,
    ExplicitRk2,
    ExplicitRk4,
}

impl SolvingType {
    pub const ALL: [SolvingType; 4] = [
        SolvingType::Analytical,
        SolvingType::ExplicitEuler,
        SolvingType::ExplicitRk2,
        SolvingType::ExplicitRk4,
    ];

    pub fn is_numerical(&self) -> bool {
        !matches!(self, SolvingType::Analytical)
    }

    /// Nominal order of accuracy, `None` for the exact reference.
    pub fn order(&self) -> Option<u32> {
        match self {
            SolvingType::Analytical => None,
            SolvingType::ExplicitEuler => Some(1),
            SolvingType::ExplicitRk2 => Some(2),
            SolvingType::ExplicitRk4 => Some(4),
        }
    }
}

impl fmt::Display for SolvingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SolvingType::Analytical => "Analytical",
            SolvingType::ExplicitEuler => "Explicit Euler",
            SolvingType::ExplicitRk2 => "Explicit RK2",
            SolvingType::ExplicitRk4 => "Explicit RK4",
        };
        f.write_str(name)
    }
}

impl TryFrom<u8> for SolvingType {
    type Error = SolvingTypeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(value as usize)
            .copied()
            .ok_or(SolvingTypeError::UnknownDiscriminant(value))
    }
}

impl FromStr for SolvingType {
    type Err = SolvingTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "analytical" => Ok(SolvingType::Analytical),
            "euler" | "expliciteuler" => Ok(SolvingType::ExplicitEuler),
            "rk2" | "explicitrk2" => Ok(SolvingType::ExplicitRk2),
            "rk4" | "explicitrk4" => Ok(SolvingType::ExplicitRk4),
            _ => Err(SolvingTypeError::UnknownName(s.to_string())),
        }
    }
}
