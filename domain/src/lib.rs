//! Structures and collaborators specific to the notification pipeline
//!
//! Everything that knows about events, subscriptions or the upstream community API lives here.
//! Generic building blocks are provided by the `library` crate.

#![deny(missing_docs)]
// Disable the lint for now as it has a high false-positive rate
#![allow(unknown_lints, clippy::nonstandard_macro_braces)]

pub mod event;
pub mod subscription;
pub mod upstream;

pub use subscription::{Subscription, SubscriptionSettings};
