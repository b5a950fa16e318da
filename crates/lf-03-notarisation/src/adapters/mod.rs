//! Adapters layer

pub mod uniqueness;

pub use uniqueness::BatchingUniquenessProvider;
