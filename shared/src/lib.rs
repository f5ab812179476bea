//! Wire protocol shared between the brawl server and its Rust clients.
//! TypeScript bindings for the browser client are generated from these
//! types via `ts-rs` (`cargo test` regenerates them).

pub mod protocol;
