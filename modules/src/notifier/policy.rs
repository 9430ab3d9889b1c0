use domain::event::{EventPayload, NotificationCategory};

/// Members who should learn about an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    /// Explicitly referenced members
    Members(Vec<String>),
    /// Every member of the event's group
    Group,
}

/// Who is notified about an event and under which preference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationPolicy {
    /// Members to notify
    pub audience: Audience,
    /// Preference recipients have to opt into
    pub category: NotificationCategory,
    /// Whether the user who triggered the event is left out
    pub exclude_actor: bool,
}

impl NotificationPolicy {
    /// Policy for an event, `None` if it does not result in push notifications
    pub fn for_payload(payload: &EventPayload) -> Option<Self> {
        use NotificationCategory::*;

        let (audience, category, exclude_actor) = match payload {
            EventPayload::TransferCommitted(parties) => (
                Audience::Members(vec![parties.payer.clone(), parties.payee.clone()]),
                MyAccount,
                true,
            ),
            EventPayload::TransferPending(parties) => {
                (Audience::Members(vec![parties.payer.clone()]), MyAccount, true)
            }
            EventPayload::TransferRejected(parties) => {
                (Audience::Members(vec![parties.payee.clone()]), MyAccount, true)
            }
            EventPayload::NeedPublished { .. } => (Audience::Group, NewNeeds, true),
            EventPayload::OfferPublished { .. } => (Audience::Group, NewOffers, true),
            EventPayload::MemberJoined { .. } => (Audience::Group, NewMembers, true),
            // Expiry is triggered by the system user, the owner is notified regardless
            EventPayload::NeedExpired { member, .. } | EventPayload::OfferExpired { member, .. } => {
                (Audience::Members(vec![member.clone()]), MyAccount, false)
            }
            EventPayload::MemberRequested { .. } | EventPayload::GroupActivated => return None,
        };

        Some(Self {
            audience,
            category,
            exclude_actor,
        })
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use domain::event::TransferParties;
    use pretty_assertions::assert_eq;

    fn parties() -> TransferParties {
        TransferParties {
            payer: "payer".into(),
            payee: "payee".into(),
            transfer: "t".into(),
        }
    }

    #[test]
    fn address_transfer_parties() {
        let committed =
            NotificationPolicy::for_payload(&EventPayload::TransferCommitted(parties())).unwrap();
        let pending =
            NotificationPolicy::for_payload(&EventPayload::TransferPending(parties())).unwrap();
        let rejected =
            NotificationPolicy::for_payload(&EventPayload::TransferRejected(parties())).unwrap();

        assert_eq!(
            committed.audience,
            Audience::Members(vec!["payer".into(), "payee".into()])
        );
        assert_eq!(pending.audience, Audience::Members(vec!["payer".into()]));
        assert_eq!(rejected.audience, Audience::Members(vec!["payee".into()]));
        assert!(committed.exclude_actor);
    }

    #[test]
    fn notify_owners_of_expired_items() {
        let policy = NotificationPolicy::for_payload(&EventPayload::OfferExpired {
            offer: "o".into(),
            member: "m".into(),
        })
        .unwrap();

        assert_eq!(policy.category, NotificationCategory::MyAccount);
        assert!(!policy.exclude_actor);
    }

    #[test]
    fn ignore_administrative_events() {
        assert_eq!(
            NotificationPolicy::for_payload(&EventPayload::GroupActivated),
            None
        );
    }
}
