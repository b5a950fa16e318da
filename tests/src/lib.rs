//! # Ledger Finality Test Suite
//!
//! Scenarios that need more than one crate of the workspace, run over the
//! in-process mock network.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/
//! │   └── core_benchmarks.rs   # sort, request encoding, signing
//! └── src/integration/
//!     ├── common.rs            # network fixture and trade flow
//!     ├── end_to_end.rs        # collect, notarise, broadcast
//!     ├── conflict.rs          # concurrent double spends
//!     ├── checkpoint_restart.rs
//!     └── state_replacement.rs # notary change, then trade on the new notary
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p lf-tests
//! cargo test -p lf-tests integration::conflict::
//! cargo bench -p lf-tests
//! ```

pub mod integration;
