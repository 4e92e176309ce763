// Copyright (C) 2016-2018 ERGO-Code
// Copyright (C) 2022-2023 Richard Lincoln

pub(crate) mod file;
pub(crate) mod list;
pub(crate) mod lu;

mod build_factors;
mod dense_block;
mod dfs;
mod factorize;
mod load;
mod markowitz;
mod pivot;
mod singletons;
mod solve;
mod update;

pub(crate) use build_factors::build_transposes;
pub(crate) use factorize::factorize;
pub(crate) use load::load;
pub(crate) use lu::LU;
pub(crate) use solve::{btran, ftran};
pub(crate) use update::replace_column;
