//! Integration test crate for Splice.
//!
//! This crate exists solely to hold cross-crate integration tests.
//! It drives the timeline model and the playback engine together.

#[cfg(test)]
mod timeline;

#[cfg(test)]
mod playback;
