// Copyright (C) 2016-2018 ERGO-Code
// Copyright (C) 2022-2023 Richard Lincoln

use thiserror::Error;

/// Outcome of a factorization, solve or update that did not complete.
///
/// Success is reported as `Ok(..)`. Every variant maps to the numeric code a
/// simplex driver expects through [`Status::code`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The factorization stopped with a partial result. Columns without a
    /// pivot must be replaced by slacks (see `make_non_singular`).
    #[error("basis matrix is singular")]
    Singular,

    #[error("invalid basis matrix: {0}")]
    InvalidBasis(&'static str),

    /// A solve or update was requested without a valid factorization.
    #[error("no valid factorization available")]
    InvalidCall,

    /// A solve found more update etas than the update region can hold.
    #[error("update region overflow")]
    UpdateOverflow,

    /// No remaining pivot candidate passes the pivot tolerance. Handled
    /// inside `factor` by one retry with a relaxed tolerance.
    #[error("pivot below tolerance")]
    NearSingular,

    /// A working area is too small even after compression. Grow the area
    /// factor and restart from `pre_process`.
    #[error("insufficient working memory")]
    OutOfMemory,

    /// The diagonal check of a column replacement is below the zero
    /// tolerance. Refactorize instead.
    #[error("column replacement would make the basis singular")]
    SingularUpdate,

    #[error("update region is full")]
    UpdateRegionFull,
}

impl Status {
    /// Numeric status code. Zero is reserved for success.
    pub fn code(&self) -> i32 {
        match self {
            Status::Singular => -1,
            Status::InvalidBasis(_) => -2,
            Status::InvalidCall => -3,
            Status::UpdateOverflow => -4,
            Status::NearSingular => -97,
            Status::OutOfMemory => -99,
            Status::SingularUpdate => 2,
            Status::UpdateRegionFull => 3,
        }
    }

    /// Whether the caller should throw away the factorization and start
    /// again from a fresh basis snapshot.
    pub fn requires_refactor(&self) -> bool {
        matches!(
            self,
            Status::SingularUpdate | Status::UpdateRegionFull | Status::UpdateOverflow
        )
    }
}

/// Converts a result into the numeric code of the external interface.
pub fn status_code<T>(result: &Result<T, Status>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(status) => status.code(),
    }
}
