//! Utility functions

mod common;
mod domain;

pub use common::*;
pub use domain::*;
