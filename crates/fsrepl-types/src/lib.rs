//! Foundation types for fsrepl.
//!
//! This crate holds the pieces shared by the storage backends and the
//! interpreter: the closed set of storage error kinds, the interpreter error
//! taxonomy with its status mapping, and the session configuration.

pub mod config;
pub mod error;
