//! HTTP module

pub mod client;
