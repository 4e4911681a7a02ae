//! Command implementations.

pub mod config;
pub mod download;
pub mod make_archive;
pub mod verify;
