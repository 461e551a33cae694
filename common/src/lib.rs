//! Shared building blocks for the vimserver workspace.
//!
//! This crate holds the pieces every other crate in the workspace needs
//! without pulling in any of their dependencies:
//!
//! - **common** (this crate): error location tracking
//! - **listener-core**: endpoint registrar, message pump, protocol dispatcher
//! - **vimserver**: command-line application wiring everything together

pub mod error;

pub use error::error_location::ErrorLocation;
