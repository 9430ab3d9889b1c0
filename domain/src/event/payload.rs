use super::EventName;
use std::collections::HashMap;
use thiserror::Error;

/// Errors while interpreting an event
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventError {
    /// A key required by the event name is absent from its data
    #[error("{event} event is missing data key {key}")]
    MissingData {
        /// Name of the event
        event: EventName,
        /// Absent key
        key: &'static str,
    },
}

/// Members and transfer referenced by a transfer event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferParties {
    /// Member paying
    pub payer: String,
    /// Member receiving
    pub payee: String,
    /// Transfer identifier
    pub transfer: String,
}

/// Typed view on the data of an [`Event`](super::Event)
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum EventPayload {
    TransferCommitted(TransferParties),
    TransferPending(TransferParties),
    TransferRejected(TransferParties),
    NeedPublished { need: String },
    NeedExpired { need: String, member: String },
    OfferPublished { offer: String },
    OfferExpired { offer: String, member: String },
    MemberJoined { member: String },
    MemberRequested { member: String },
    GroupActivated,
}

impl EventPayload {
    /// Decodes the data of an event. Unknown names yield `None`.
    pub fn decode(
        name: &str,
        data: &HashMap<String, String>,
    ) -> Result<Option<EventPayload>, EventError> {
        let name = match name.parse::<EventName>() {
            Ok(name) => name,
            Err(_) => return Ok(None),
        };

        let get = |key: &'static str| {
            data.get(key)
                .cloned()
                .ok_or(EventError::MissingData { event: name, key })
        };

        let transfer = || -> Result<TransferParties, EventError> {
            Ok(TransferParties {
                payer: get("payer")?,
                payee: get("payee")?,
                transfer: get("transfer")?,
            })
        };

        let payload = match name {
            EventName::TransferCommitted => EventPayload::TransferCommitted(transfer()?),
            EventName::TransferPending => EventPayload::TransferPending(transfer()?),
            EventName::TransferRejected => EventPayload::TransferRejected(transfer()?),
            EventName::NeedPublished => EventPayload::NeedPublished { need: get("need")? },
            EventName::NeedExpired => EventPayload::NeedExpired {
                need: get("need")?,
                member: get("member")?,
            },
            EventName::OfferPublished => EventPayload::OfferPublished {
                offer: get("offer")?,
            },
            EventName::OfferExpired => EventPayload::OfferExpired {
                offer: get("offer")?,
                member: get("member")?,
            },
            EventName::MemberJoined => EventPayload::MemberJoined {
                member: get("member")?,
            },
            EventName::MemberRequested => EventPayload::MemberRequested {
                member: get("member")?,
            },
            EventName::GroupActivated => EventPayload::GroupActivated,
        };

        Ok(Some(payload))
    }

    /// Name of the event this payload belongs to
    pub fn name(&self) -> EventName {
        match self {
            EventPayload::TransferCommitted(_) => EventName::TransferCommitted,
            EventPayload::TransferPending(_) => EventName::TransferPending,
            EventPayload::TransferRejected(_) => EventName::TransferRejected,
            EventPayload::NeedPublished { .. } => EventName::NeedPublished,
            EventPayload::NeedExpired { .. } => EventName::NeedExpired,
            EventPayload::OfferPublished { .. } => EventName::OfferPublished,
            EventPayload::OfferExpired { .. } => EventName::OfferExpired,
            EventPayload::MemberJoined { .. } => EventName::MemberJoined,
            EventPayload::MemberRequested { .. } => EventName::MemberRequested,
            EventPayload::GroupActivated => EventName::GroupActivated,
        }
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use pretty_assertions::assert_eq;

    fn data(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn decode_transfer_events() {
        let payload = EventPayload::decode(
            "TransferPending",
            &data(&[("payer", "m1"), ("payee", "m2"), ("transfer", "t1")]),
        )
        .unwrap();

        assert_eq!(
            payload,
            Some(EventPayload::TransferPending(TransferParties {
                payer: "m1".into(),
                payee: "m2".into(),
                transfer: "t1".into(),
            }))
        );
    }

    #[test]
    fn ignore_unknown_names() {
        let payload = EventPayload::decode("SomethingHappened", &data(&[("x", "y")])).unwrap();
        assert_eq!(payload, None);
    }

    #[test]
    fn report_missing_keys() {
        let error = EventPayload::decode("OfferExpired", &data(&[("offer", "o1")])).unwrap_err();

        assert_eq!(
            error,
            EventError::MissingData {
                event: EventName::OfferExpired,
                key: "member"
            }
        );
    }

    #[test]
    fn decode_events_without_data() {
        let payload = EventPayload::decode("GroupActivated", &HashMap::new()).unwrap();
        assert_eq!(payload.map(|p| p.name()), Some(EventName::GroupActivated));
    }
}
