//! Configuration file access.

pub mod config;
