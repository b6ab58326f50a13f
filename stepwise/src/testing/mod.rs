//! Testing utilities for stepwise.
//!
//! This module provides:
//! - Mock, gated and panicking action handlers
//! - A store that injects transient write failures
//! - Assertions and polling helpers for build state

mod assertions;
mod mocks;

pub use assertions::{assert_all_pending, assert_step_status, wait_for_status, wait_for_trigger};
pub use mocks::{FlakyBuildStateStore, GatedAction, MockAction, PanickingAction};
