use super::{FailureKind, MailMessage, MailSender, MulticastSender, PushMessage, SendOutcome};
use super::TransportError;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// [`MulticastSender`] which records every call and answers with scripted outcomes
#[derive(Default)]
pub struct RecordingMulticastSender {
    calls: Mutex<Vec<(Vec<String>, PushMessage)>>,
    failures: Mutex<HashMap<String, (FailureKind, String)>>,
    unavailable: Mutex<HashSet<usize>>,
}

impl RecordingMulticastSender {
    /// Reports the given token as failed in every subsequent call
    pub fn fail_token(&self, token: impl Into<String>, kind: FailureKind, reason: impl Into<String>) {
        lock(&self.failures).insert(token.into(), (kind, reason.into()));
    }

    /// Makes the n-th call (zero based) fail as a whole
    pub fn fail_call(&self, index: usize) {
        lock(&self.unavailable).insert(index);
    }

    /// Token lists of all calls in the order they were made
    pub fn calls(&self) -> Vec<Vec<String>> {
        lock(&self.calls).iter().map(|(t, _)| t.clone()).collect()
    }

    /// Messages of all calls in the order they were made
    pub fn messages(&self) -> Vec<PushMessage> {
        lock(&self.calls).iter().map(|(_, m)| m.clone()).collect()
    }
}

#[async_trait]
impl MulticastSender for RecordingMulticastSender {
    async fn send_multicast(
        &self,
        tokens: &[String],
        message: &PushMessage,
    ) -> Result<Vec<SendOutcome>, TransportError> {
        let index = {
            let mut calls = lock(&self.calls);
            calls.push((tokens.to_vec(), message.clone()));
            calls.len() - 1
        };

        if lock(&self.unavailable).contains(&index) {
            return Err(TransportError::Timeout);
        }

        let failures = lock(&self.failures);
        Ok(tokens
            .iter()
            .map(|token| match failures.get(token) {
                Some((kind, reason)) => SendOutcome::Failure {
                    kind: *kind,
                    reason: reason.clone(),
                },
                None => SendOutcome::Success,
            })
            .collect())
    }
}

/// [`MailSender`] which records delivered messages
#[derive(Default)]
pub struct RecordingMailSender {
    sent: Mutex<Vec<MailMessage>>,
    rejected: Mutex<HashSet<String>>,
}

impl RecordingMailSender {
    /// Rejects every message addressed to the given address
    pub fn reject(&self, email: impl Into<String>) {
        lock(&self.rejected).insert(email.into());
    }

    /// Messages accepted so far
    pub fn sent(&self) -> Vec<MailMessage> {
        lock(&self.sent).clone()
    }
}

#[async_trait]
impl MailSender for RecordingMailSender {
    async fn send(&self, message: &MailMessage) -> Result<(), TransportError> {
        if lock(&self.rejected).contains(&message.to.email) {
            return Err(TransportError::Rejected {
                status: 422,
                body: "recipient rejected".into(),
            });
        }

        lock(&self.sent).push(message.clone());
        Ok(())
    }
}
