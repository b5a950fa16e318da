//! Cross-crate scenarios.

#[cfg(test)]
mod common;

pub mod checkpoint_restart;
pub mod conflict;
pub mod end_to_end;
pub mod state_replacement;
