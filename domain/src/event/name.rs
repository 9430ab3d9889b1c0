use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Known event names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum EventName {
    TransferCommitted,
    TransferPending,
    TransferRejected,
    NeedPublished,
    NeedExpired,
    OfferPublished,
    OfferExpired,
    MemberJoined,
    MemberRequested,
    GroupActivated,
}

/// Name does not match any known event
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown event name {0}")]
pub struct UnknownEventName(pub String);

impl EventName {
    /// Textual representation used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::TransferCommitted => "TransferCommitted",
            EventName::TransferPending => "TransferPending",
            EventName::TransferRejected => "TransferRejected",
            EventName::NeedPublished => "NeedPublished",
            EventName::NeedExpired => "NeedExpired",
            EventName::OfferPublished => "OfferPublished",
            EventName::OfferExpired => "OfferExpired",
            EventName::MemberJoined => "MemberJoined",
            EventName::MemberRequested => "MemberRequested",
            EventName::GroupActivated => "GroupActivated",
        }
    }
}

impl FromStr for EventName {
    type Err = UnknownEventName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "TransferCommitted" => EventName::TransferCommitted,
            "TransferPending" => EventName::TransferPending,
            "TransferRejected" => EventName::TransferRejected,
            "NeedPublished" => EventName::NeedPublished,
            "NeedExpired" => EventName::NeedExpired,
            "OfferPublished" => EventName::OfferPublished,
            "OfferExpired" => EventName::OfferExpired,
            "MemberJoined" => EventName::MemberJoined,
            "MemberRequested" => EventName::MemberRequested,
            "GroupActivated" => EventName::GroupActivated,
            other => return Err(UnknownEventName(other.to_owned())),
        })
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
