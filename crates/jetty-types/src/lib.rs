//! Foundation types for the Jetty starter.
//!
//! This crate contains the types shared by the console core and the
//! launcher: the error taxonomy and the TOML configuration model.

pub mod config;
pub mod error;
