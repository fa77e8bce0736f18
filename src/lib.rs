// src/lib.rs

#![doc = include_str!("../README.md")]

pub mod density;
pub mod error;
pub mod linalg_backends;
pub mod reducer;

pub use error::{ReduceError, TableRole};
pub use reducer::{reduce, reduce_with_config, ReducerConfig, WhiteningReducer};
