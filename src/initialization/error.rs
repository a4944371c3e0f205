use std::{error::Error, fmt};

use rand_distr::{NormalError, uniform::Error as UniformError};

/// The result type of the random parameter generators.
pub type Result<T> = std::result::Result<T, RandErr>;

/// Returned when a distribution can't be built from its parameters.
#[derive(Debug)]
pub struct RandErr(String);

impl From<NormalError> for RandErr {
    fn from(value: NormalError) -> Self {
        Self(value.to_string())
    }
}

impl From<UniformError> for RandErr {
    fn from(value: UniformError) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for RandErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid distribution: {}", self.0)
    }
}

impl Error for RandErr {}
