//! Constants shared across modules

/// Port the HTTP boundary listens on
pub const PORT_API: &str = "2028";

/// Time-to-live of subscriptions, they live until removed
pub const SUBSCRIPTION_TTL: Option<std::time::Duration> = None;
