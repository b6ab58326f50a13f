//! HTTP front end for the stepwise pipeline orchestrator.
//!
//! Loads a JSON pipeline definition, runs builds of it with a
//! [`stepwise::engine::Engine`] and exposes the polling, trigger and
//! retrigger endpoints pipeline visualisers talk to.

pub mod actions;
pub mod api;
pub mod config;
pub mod definition;
