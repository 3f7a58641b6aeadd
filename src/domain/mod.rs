//! Core domain types and logic.

pub mod catalog;
pub mod config_validation;
pub mod dimension;
pub mod environment;
pub mod error;
pub mod frame;
pub mod gene;
pub mod node;
pub mod operators;
pub mod setup;
