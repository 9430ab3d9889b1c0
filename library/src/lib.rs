//! Independent and project agnostic libraries
//!
//! Ideally, any of the submodules in this crate can be extracted into their own crate
//! at any given time. They have been developed with the notification pipeline in mind,
//! however, everything domain specific lives in the `domain` crate.

#![deny(missing_docs)]
// Disable the lint for now as it has a high false-positive rate
#![allow(unknown_lints, clippy::nonstandard_macro_braces)]

pub mod auth;
pub mod communication;
pub mod helpers;
pub mod storage;
pub mod transport;

/// Generic error type
pub type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result with no value and a [`BoxedError`]
pub type EmptyResult = Result<(), BoxedError>;
