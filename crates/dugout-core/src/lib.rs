// Library root: player identity resolution and valuation across fantasy
// data providers. Re-exports every module for the binary and integration
// tests.

pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod identity;
pub mod normalize;
pub mod pipeline;
pub mod player;
pub mod session;
pub mod sources;
pub mod teams;
pub mod valuation;
