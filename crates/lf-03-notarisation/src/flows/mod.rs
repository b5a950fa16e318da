//! Notarisation flows.

pub mod client;
pub mod service;

pub use client::NotaryFlow;
pub use service::{CommitOperation, NotaryServiceFlow};
