//! Structures to communicate between services using a durable event log
//!
//! Services never talk to each other directly. Whenever something noteworthy happens,
//! a [`Notification`](event::Notification) is appended to its queue and every interested
//! consumer group tails that queue independently. For a more in-depth explanation,
//! consult the [`event`] module.

mod communication_factory;
mod error;

pub mod event;
pub mod implementation;

pub use communication_factory::CommunicationFactory;
pub use error::BlackboxError;
