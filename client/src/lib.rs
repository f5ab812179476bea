//! Headless client for the presence server: a reconnecting connection
//! handle, the shadow mirror of remote participants, and a wandering bot
//! used to populate sessions during development.

pub mod bot;
pub mod connection;
pub mod shadow;
