use super::{Audience, Dispatcher, NotificationPolicy, SubscriptionResolver};
use crate::subscriptions::SubscriptionStore;
use async_trait::async_trait;
use domain::event::Event;
use domain::upstream::UpstreamApi;
use harness::{RedisCommunicationFactory, Service};
use library::communication::event::{Consumer, NotificationFrame};
use library::transport::{MulticastSender, PushMessage};
use library::{BoxedError, EmptyResult};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Collaborators of the [`NotifierService`]
#[derive(Clone)]
pub struct NotifierConfig {
    /// Push transport
    pub sender: Arc<dyn MulticastSender>,
    /// Upstream API used to list group members
    pub upstream: Arc<dyn UpstreamApi>,
}

/// Consumer turning events into push notifications
pub struct NotifierService {
    resolver: SubscriptionResolver,
    dispatcher: Dispatcher,
    upstream: Arc<dyn UpstreamApi>,
}

impl NotifierService {
    /// Creates a new instance operating on the given subscriptions
    pub fn new(subscriptions: SubscriptionStore, config: &NotifierConfig) -> Self {
        Self {
            resolver: SubscriptionResolver::new(subscriptions.clone()),
            dispatcher: Dispatcher::new(config.sender.clone(), subscriptions),
            upstream: config.upstream.clone(),
        }
    }

    fn message(event: &Event) -> PushMessage {
        let mut data = event.data.clone();
        data.insert("event".into(), event.name.clone());
        data.insert("code".into(), event.code.clone());
        data.insert("user".into(), event.user.clone());
        data.insert("source".into(), event.source.clone());

        PushMessage::new(data)
    }

    async fn members(&self, event: &Event, audience: Audience) -> Result<Vec<String>, BoxedError> {
        Ok(match audience {
            Audience::Members(members) => members,
            Audience::Group => self
                .upstream
                .group_members(&event.code)
                .await?
                .into_iter()
                .map(|member| member.id)
                .collect(),
        })
    }
}

impl Service<RedisCommunicationFactory> for NotifierService {
    const NAME: &'static str = "NotifierService";

    type Instance = NotifierService;
    type Config = NotifierConfig;

    fn instantiate(factory: RedisCommunicationFactory, config: &Self::Config) -> Self::Instance {
        NotifierService::new(SubscriptionStore::new(factory.indexed_store()), config)
    }
}

#[async_trait]
impl Consumer for NotifierService {
    type Notification = Event;

    #[instrument(skip(self, notification), fields(id = notification.id(), name = %notification.name))]
    async fn consume(&self, notification: NotificationFrame<Self::Notification>) -> EmptyResult {
        let event = notification.into_inner();

        let policy = match event.payload()? {
            Some(payload) => NotificationPolicy::for_payload(&payload),
            None => {
                info!("No handler for event, skipping");
                return Ok(());
            }
        };

        let policy = match policy {
            Some(policy) => policy,
            None => {
                debug!("Event does not trigger push notifications");
                return Ok(());
            }
        };

        let members = self.members(&event, policy.audience).await?;
        let excluded = if policy.exclude_actor {
            Some(event.user.as_str())
        } else {
            None
        };

        let recipients = self
            .resolver
            .resolve(&members, excluded, policy.category)
            .await?;

        if recipients.is_empty() {
            debug!(members = members.len(), "No subscribed recipients");
            return Ok(());
        }

        self.dispatcher
            .dispatch(&recipients, &Self::message(&event))
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use crate::subscriptions::fixtures::{store, subscription};
    use domain::upstream::{Member, StaticUpstream};
    use library::communication::event::{
        ConsumerExt, ConsumerGroupDescriptor, ConsumerGroupIdentifier, NotificationPublisher,
    };
    use library::communication::implementation::mock::MockQueue;
    use library::storage::MockStoreBackend;
    use library::transport::RecordingMulticastSender;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    const IDLE: Option<Duration> = Some(Duration::from_millis(50));

    fn event(name: &str, user: &str, data: &[(&str, &str)]) -> Event {
        Event {
            name: name.into(),
            source: "https://social.example.com".into(),
            code: "GRP1".into(),
            time: chrono::Utc::now(),
            user: user.into(),
            data: data
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    fn member(id: &str) -> Member {
        Member {
            id: id.into(),
            code: id.to_uppercase(),
            name: id.into(),
            account: None,
        }
    }

    struct Fixture {
        store: SubscriptionStore,
        backend: Arc<MockStoreBackend>,
        sender: Arc<RecordingMulticastSender>,
        service: NotifierService,
    }

    fn fixture() -> Fixture {
        let (store, backend) = store();
        let sender = Arc::new(RecordingMulticastSender::default());

        let mut upstream = StaticUpstream::default();
        upstream.members.insert(
            "GRP1".into(),
            vec![member("m1"), member("m2"), member("m3")],
        );

        let config = NotifierConfig {
            sender: sender.clone(),
            upstream: Arc::new(upstream),
        };

        Fixture {
            service: NotifierService::new(store.clone(), &config),
            store,
            backend,
            sender,
        }
    }

    fn frame(event: Event) -> NotificationFrame<Event> {
        NotificationFrame::new("1-0", event)
    }

    fn transfer(name: &str, user: &str) -> Event {
        event(name, user, &[("payer", "m1"), ("payee", "m2"), ("transfer", "t1")])
    }

    #[tokio::test]
    async fn notify_transfer_parties_except_the_actor() {
        let f = fixture();
        f.store.upsert(subscription("payer-phone", "m1", "u1", &["myAccount"])).await.unwrap();
        f.store.upsert(subscription("payee-phone", "m2", "u2", &["myAccount"])).await.unwrap();

        f.service
            .consume(frame(transfer("TransferCommitted", "u1")))
            .await
            .unwrap();

        assert_eq!(f.sender.calls(), vec![vec!["payee-phone".to_owned()]]);

        let data = &f.sender.messages()[0].data;
        assert_eq!(data["event"], "TransferCommitted");
        assert_eq!(data["code"], "GRP1");
        assert_eq!(data["transfer"], "t1");
    }

    #[tokio::test]
    async fn notify_group_members_who_opted_in() {
        let f = fixture();
        f.store.upsert(subscription("a", "m1", "u1", &["newOffers"])).await.unwrap();
        f.store.upsert(subscription("b", "m2", "u2", &["newNeeds"])).await.unwrap();
        f.store.upsert(subscription("c", "m3", "u3", &["newOffers"])).await.unwrap();

        f.service
            .consume(frame(event("OfferPublished", "u3", &[("offer", "o1")])))
            .await
            .unwrap();

        assert_eq!(f.sender.calls(), vec![vec!["a".to_owned()]]);
    }

    #[tokio::test]
    async fn skip_unknown_and_silent_events() {
        let f = fixture();
        f.store.upsert(subscription("a", "m1", "u1", &["myAccount"])).await.unwrap();

        f.service
            .consume(frame(event("SomethingElse", "u2", &[("member", "m1")])))
            .await
            .unwrap();
        f.service
            .consume(frame(event("MemberRequested", "u2", &[("member", "m1")])))
            .await
            .unwrap();

        assert!(f.sender.calls().is_empty());
    }

    #[tokio::test]
    async fn fail_on_missing_data_keys() {
        let f = fixture();

        let result = f
            .service
            .consume(frame(event("TransferCommitted", "u1", &[("payer", "m1")])))
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn fail_when_the_store_is_unavailable() {
        let f = fixture();
        f.backend.set_available(false);

        let result = f
            .service
            .consume(frame(transfer("TransferPending", "u9")))
            .await;

        assert!(result.is_err());
        assert!(f.sender.calls().is_empty());
    }

    #[tokio::test]
    async fn acknowledge_handled_and_unknown_events_only() {
        let f = fixture();
        f.store.upsert(subscription("a", "m1", "u1", &["myAccount"])).await.unwrap();

        let queue = MockQueue::default();
        queue.publish(&transfer("TransferPending", "u9")).await.unwrap();
        queue.publish(&event("Unheard", "u9", &[])).await.unwrap();
        queue
            .publish(&event("TransferRejected", "u9", &[]))
            .await
            .unwrap();

        let group = ConsumerGroupDescriptor::from(ConsumerGroupIdentifier::Notifier);
        f.service
            .consume_queue(queue.clone(), &group, "notifier-1", IDLE)
            .await
            .unwrap();

        assert_eq!(queue.pending("events", "notifier"), 1);
        assert_eq!(f.sender.calls().len(), 1);
    }
}
