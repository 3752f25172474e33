// src/commands/mod.rs
//! Command handlers for the alpmbuild CLI

mod build;

pub use build::cmd_build;
