//! Pyra: a guarded command pipeline for voice-driven on-chain transfers.
//!
//! A spoken request becomes a pending command that must be read back and
//! confirmed, then clear a chain of safety gates (name resolution, address
//! validation, contract detection, source verification, security scan)
//! before the dispatcher signs and sends it. Progress is broadcast as
//! events so any front-end can narrate each step.

pub mod app;
pub mod bootstrap;
pub mod channels;
pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod encoding;
pub mod error;
pub mod gates;
pub mod pipeline;
pub mod providers;
pub mod settings;
pub mod tools;

pub use crate::error::{Error, Result};
