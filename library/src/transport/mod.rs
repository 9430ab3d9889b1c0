//! Outbound delivery capabilities
//!
//! The pipeline depends only on two shapes: a [`MulticastSender`] which delivers one payload to
//! up to [`MULTICAST_LIMIT`] endpoint tokens and reports per-token outcomes in submission order,
//! and a [`MailSender`] which delivers one rendered message to one recipient. Provider specific
//! adapters translate their failure taxonomies into [`FailureKind`].

mod error;
mod fcm;
mod mail;
mod mailersend;
mod push;

#[cfg(any(test, feature = "test"))]
mod mock;

pub use error::TransportError;
pub use fcm::FcmSender;
pub use mail::{LoggingMailSender, MailMessage, MailSender, Mailbox};
pub use mailersend::MailerSendSender;
pub use push::{FailureKind, MulticastSender, PushMessage, SendOutcome, MULTICAST_LIMIT};

#[cfg(any(test, feature = "test"))]
pub use mock::{RecordingMailSender, RecordingMulticastSender};
