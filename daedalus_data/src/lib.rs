//! Shared data model for parsed Daedalus dialog scripts.
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]

pub mod defs;
pub mod validate;

pub use defs::*;
pub use validate::{ValidationError, validate_model};
