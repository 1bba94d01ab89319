//! # Task Token Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── lifecycle.rs   # Create, discover, complete through the public API
//!     ├── evidence.rs    # Evidence policy against the ledger verifier
//!     └── discovery.rs   # Partial failures, outages, foreign outputs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p task-tests
//! cargo test -p task-tests integration::evidence
//!
//! # Benchmarks
//! cargo bench -p task-tests
//! ```

pub mod integration;
