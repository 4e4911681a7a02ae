//! HOOT - packaging and retrieval for the HOOT occluded object tracking dataset.
//!
//! This library provides the two halves of dataset distribution:
//!
//! - [`publisher`]: walks a source tree of annotated frame sets, packages each
//!   video into a content-addressed zip archive, and publishes a manifest.
//!   Builds are resumable: every packaged video leaves a zero-byte marker whose
//!   name records its content hash and size.
//! - [`retriever`]: fetches the manifest and downloads the selected archives,
//!   staging each transfer and only promoting it to its canonical name once its
//!   size and content hash match the manifest.
//!
//! Supporting modules hold the manifest model ([`dataset`]), the annotation
//! loader ([`anno`]), content hashing ([`digest`]), configuration
//! ([`config`]) and logging ([`logging`]).

pub mod anno;
pub mod batch;
pub mod config;
pub mod dataset;
pub mod digest;
pub mod error;
pub mod logging;
pub mod publisher;
pub mod retriever;

pub use error::ErrorCategory;
