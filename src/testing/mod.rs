//! Testing infrastructure for autopilot.
//!
//! This module provides the collaborator traits the cycle controller is
//! generic over, plus mocks implementing them with controllable behavior.
//!
//! # Example
//!
//! ```rust,ignore
//! use autopilot::testing::{MockCommandRunner, MockGitOperations, MockMetricsProvider};
//!
//! let git = MockGitOperations::new().with_branch("develop");
//! let provider = MockMetricsProvider::new();
//! let runner = MockCommandRunner::new();
//! ```

pub mod mocks;
pub mod traits;

// Re-export commonly used types
pub use mocks::*;
pub use traits::*;
