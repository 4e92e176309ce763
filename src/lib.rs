// Copyright (C) 2016-2018 ERGO-Code
// Copyright (C) 2022-2023 Richard Lincoln

//! LU factorization and update of simplex bases.
//!
//! A basis is factorized by [`SparseFactorization`] (Markowitz pivoting with
//! a dense breakover) or, for small dimensions, by [`DenseFactorization`].
//! Both implement the [`Factorization`] contract used by a simplex solver:
//! FTRAN, BTRAN and column replacement on [`SparseVector`] workspaces.
//! [`BasisFactorization`] picks the factorization and handles singular bases
//! and working areas that turn out too small.

mod basis;
mod basis_factorization;
mod dense;
mod factorization;
mod lu;
mod options;
mod sparse;
mod sparse_vector;
mod status;

pub use basis::BasisMatrix;
pub use basis_factorization::{BasisFactorization, Engine, FactorSummary};
pub use dense::DenseFactorization;
pub use factorization::{FactorContext, Factorization};
pub use options::Options;
pub use sparse::SparseFactorization;
pub use sparse_vector::{SparseVector, PLACEHOLDER, TINY_ELEMENT};
pub use status::{status_code, Status};
