//! Brawl presence server library.
//!
//! This module exposes the server components for use in tests and binaries.

pub mod config;
pub mod participant;
pub mod registry;
pub mod session_loop;
pub mod throttle;
pub mod ws;
