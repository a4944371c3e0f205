use std::{error::Error, fmt};

/// The result type of the optimizers.
pub type Result<T> = std::result::Result<T, SizeMismatchErr>;

/// Returned when a diff and the model blob it updates have a different amount of values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeMismatchErr {
    pub got: usize,
    pub expected: usize,
}

impl fmt::Display for SizeMismatchErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "diff has {} values but the model blob has {}",
            self.got, self.expected
        )
    }
}

impl Error for SizeMismatchErr {}

pub(super) fn check_len(diff: &[f32], model: &[f32]) -> Result<()> {
    if diff.len() != model.len() {
        return Err(SizeMismatchErr {
            got: diff.len(),
            expected: model.len(),
        });
    }

    Ok(())
}
