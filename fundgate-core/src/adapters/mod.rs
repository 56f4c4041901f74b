//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - reqwest JSON client for the ledger, withdrawal and passcode services
//! - in-memory demo backend standing in for every remote service
//! - file and memory auth stores, clocks and cache invalidators

pub mod demo;
pub mod file_store;
pub mod http;
pub mod memory;

#[cfg(test)]
pub mod http_mock;
