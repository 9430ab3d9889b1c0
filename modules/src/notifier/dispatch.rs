use super::Recipient;
use crate::subscriptions::SubscriptionStore;
use library::transport::{
    MulticastSender, PushMessage, SendOutcome, TransportError, MULTICAST_LIMIT,
};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

/// Failures aborting a dispatch
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A multicast call failed as a whole
    #[error("multicast call for chunk {chunk} failed")]
    Send {
        /// Index of the chunk
        chunk: usize,
        /// Underlying transport error
        #[source]
        source: TransportError,
    },
    /// Transport returned a different number of outcomes than tokens submitted
    #[error("received {received} outcomes for {submitted} tokens")]
    OutcomeMismatch {
        /// Tokens in the chunk
        submitted: usize,
        /// Outcomes reported
        received: usize,
    },
}

/// Tally of a completed dispatch
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    /// Multicast calls issued
    pub chunks: usize,
    /// Tokens the message was accepted for
    pub delivered: usize,
    /// Tokens the message was refused for
    pub failed: usize,
    /// Subscriptions removed because their endpoint is gone
    pub pruned: usize,
}

/// Fans a message out to recipients in bounded chunks and prunes dead endpoints
pub struct Dispatcher {
    sender: Arc<dyn MulticastSender>,
    subscriptions: SubscriptionStore,
}

impl Dispatcher {
    /// Creates a new dispatcher
    pub fn new(sender: Arc<dyn MulticastSender>, subscriptions: SubscriptionStore) -> Self {
        Self {
            sender,
            subscriptions,
        }
    }

    /// Delivers the message to every recipient.
    ///
    /// Chunks of at most [`MULTICAST_LIMIT`] tokens are sent one after another. Outcomes are
    /// matched to the submitted tokens by position and subscriptions whose endpoint has been
    /// reported as permanently invalid are deleted. Per-token failures never abort the dispatch,
    /// a failing multicast call does.
    #[instrument(skip(self, recipients, message), fields(recipients = recipients.len()))]
    pub async fn dispatch(
        &self,
        recipients: &[Recipient],
        message: &PushMessage,
    ) -> Result<DispatchReport, DispatchError> {
        let mut report = DispatchReport::default();

        if recipients.is_empty() {
            return Ok(report);
        }

        let tokens: Vec<String> = recipients.iter().map(|r| r.token.clone()).collect();

        // Duplicate tokens resolve to the recipient seen last
        let owners: HashMap<&str, &Recipient> =
            recipients.iter().map(|r| (r.token.as_str(), r)).collect();

        for (index, chunk) in tokens.chunks(MULTICAST_LIMIT).enumerate() {
            let outcomes = self
                .sender
                .send_multicast(chunk, message)
                .await
                .map_err(|source| DispatchError::Send {
                    chunk: index,
                    source,
                })?;

            if outcomes.len() != chunk.len() {
                return Err(DispatchError::OutcomeMismatch {
                    submitted: chunk.len(),
                    received: outcomes.len(),
                });
            }

            report.chunks += 1;
            self.reconcile(chunk, &outcomes, &owners, &mut report).await;

            debug!(chunk = index, size = chunk.len(), "Dispatched chunk");
        }

        info!(?report, "Dispatched notification");
        Ok(report)
    }

    async fn reconcile(
        &self,
        tokens: &[String],
        outcomes: &[SendOutcome],
        owners: &HashMap<&str, &Recipient>,
        report: &mut DispatchReport,
    ) {
        for (token, outcome) in tokens.iter().zip(outcomes.iter()) {
            let owner = match owners.get(token.as_str()) {
                Some(owner) => owner,
                None => continue,
            };

            match outcome {
                SendOutcome::Success => {
                    report.delivered += 1;
                    debug!(member = %owner.member, "Notification delivered");
                }
                SendOutcome::Failure { kind, reason } => {
                    report.failed += 1;
                    warn!(member = %owner.member, ?kind, %reason, "Notification not delivered");

                    if outcome.is_permanently_invalid() {
                        self.prune(owner, report).await;
                    }
                }
            }
        }
    }

    async fn prune(&self, owner: &Recipient, report: &mut DispatchReport) {
        // A failed removal is retried the next time the endpoint is reported
        match self.subscriptions.delete(&owner.subscription).await {
            Ok(_) => {
                report.pruned += 1;
                info!(
                    id = %owner.subscription,
                    member = %owner.member,
                    "Removed subscription of unregistered endpoint"
                );
            }
            Err(error) => error!(
                id = %owner.subscription,
                ?error,
                "Failed to remove subscription of unregistered endpoint"
            ),
        }
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use crate::subscriptions::fixtures::{store, subscription};
    use library::storage::StorageError;
    use library::transport::{FailureKind, RecordingMulticastSender};
    use pretty_assertions::assert_eq;

    fn recipients(count: usize) -> Vec<Recipient> {
        (0..count)
            .map(|i| Recipient {
                token: format!("token-{}", i),
                subscription: format!("sub-{}", i),
                member: format!("member-{}", i),
            })
            .collect()
    }

    /// Stores one subscription per token and returns the matching recipients
    async fn stored_recipients(store: &SubscriptionStore, count: usize) -> Vec<Recipient> {
        let mut recipients = Vec::with_capacity(count);

        for i in 0..count {
            let member = format!("member-{}", i);
            let stored = store
                .upsert(subscription(&format!("token-{}", i), &member, "u1", &["myAccount"]))
                .await
                .unwrap();

            recipients.push(Recipient {
                token: stored.token,
                subscription: stored.id,
                member,
            });
        }

        recipients
    }

    #[tokio::test]
    async fn split_recipients_into_bounded_chunks() {
        let (store, backend) = store();
        let recipients = stored_recipients(&store, 1201).await;

        let sender = Arc::new(RecordingMulticastSender::default());
        sender.fail_token("token-1100", FailureKind::PermanentInvalid, "NotRegistered");

        let report = Dispatcher::new(sender.clone(), store.clone())
            .dispatch(&recipients, &PushMessage::default())
            .await
            .unwrap();

        let calls = sender.calls();
        let sizes: Vec<usize> = calls.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![500, 500, 201]);
        assert_eq!(calls[2][0], "token-1000");
        assert_eq!(calls[2][200], "token-1200");

        assert_eq!(
            report,
            DispatchReport {
                chunks: 3,
                delivered: 1200,
                failed: 1,
                pruned: 1,
            }
        );

        // Only the subscription behind position 100 of the last chunk is gone
        assert_eq!(backend.len(), 1200);
        assert!(matches!(
            store.get(&recipients[1100].subscription).await,
            Err(StorageError::NotFound { .. })
        ));
        for neighbour in [&recipients[1099], &recipients[1101], &recipients[100]] {
            let remaining = store.get(&neighbour.subscription).await.unwrap();
            assert_eq!(remaining.token, neighbour.token);
        }
    }

    #[tokio::test]
    async fn prune_only_the_unregistered_endpoint() {
        let (store, _) = store();
        let mut stored = Vec::new();
        for i in 0..4 {
            let s = store
                .upsert(subscription(&format!("t{}", i), "m1", &format!("u{}", i), &["myAccount"]))
                .await
                .unwrap();
            stored.push(s);
        }

        let sender = Arc::new(RecordingMulticastSender::default());
        sender.fail_token("t2", FailureKind::PermanentInvalid, "NotRegistered");
        sender.fail_token("t3", FailureKind::Transient, "Unavailable");

        let recipients: Vec<Recipient> = stored
            .iter()
            .map(|s| Recipient {
                token: s.token.clone(),
                subscription: s.id.clone(),
                member: s.member.clone(),
            })
            .collect();

        let report = Dispatcher::new(sender, store.clone())
            .dispatch(&recipients, &PushMessage::default())
            .await
            .unwrap();

        assert_eq!(report.pruned, 1);
        assert_eq!(report.failed, 2);

        let mut remaining: Vec<String> = store
            .find_by_member("m1")
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect();
        remaining.sort();
        assert_eq!(remaining, vec!["t0", "t1", "t3"]);
    }

    #[tokio::test]
    async fn skip_dispatch_without_recipients() {
        let (store, _) = store();
        let sender = Arc::new(RecordingMulticastSender::default());

        let report = Dispatcher::new(sender.clone(), store)
            .dispatch(&[], &PushMessage::default())
            .await
            .unwrap();

        assert_eq!(report, DispatchReport::default());
        assert!(sender.calls().is_empty());
    }

    #[tokio::test]
    async fn abort_on_failing_multicast_call() {
        let (store, _) = store();
        let sender = Arc::new(RecordingMulticastSender::default());
        sender.fail_call(1);

        let result = Dispatcher::new(sender.clone(), store)
            .dispatch(&recipients(1201), &PushMessage::default())
            .await;

        assert!(matches!(result, Err(DispatchError::Send { chunk: 1, .. })));
        assert_eq!(sender.calls().len(), 2);
    }

    #[tokio::test]
    async fn keep_going_when_pruning_fails() {
        let (store, backend) = store();
        let sender = Arc::new(RecordingMulticastSender::default());
        sender.fail_token("token-0", FailureKind::PermanentInvalid, "NotRegistered");
        backend.set_available(false);

        let report = Dispatcher::new(sender.clone(), store)
            .dispatch(&recipients(3), &PushMessage::default())
            .await
            .unwrap();

        assert_eq!(report.pruned, 0);
        assert_eq!(report.delivered, 2);
    }
}
