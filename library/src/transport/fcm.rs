use super::{FailureKind, MulticastSender, PushMessage, SendOutcome, TransportError};
use super::MULTICAST_LIMIT;
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{instrument, trace};

#[derive(Serialize)]
struct MulticastRequest<'a> {
    registration_ids: &'a [String],
    data: &'a HashMap<String, String>,
}

#[derive(Deserialize)]
struct MulticastResponse {
    #[serde(default)]
    results: Vec<MulticastResult>,
}

#[derive(Deserialize)]
struct MulticastResult {
    #[serde(default)]
    error: Option<String>,
}

/// [`MulticastSender`] talking to the Firebase Cloud Messaging legacy HTTP endpoint
pub struct FcmSender {
    client: Client,
    endpoint: Url,
    server_key: String,
}

impl FcmSender {
    /// Creates a new sender whose requests are aborted after `timeout`
    pub fn new(endpoint: Url, server_key: String, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoint,
            server_key,
        })
    }

    fn classify(error: &str) -> FailureKind {
        match error {
            "NotRegistered" | "InvalidRegistration" => FailureKind::PermanentInvalid,
            "Unavailable"
            | "InternalServerError"
            | "DeviceMessageRateExceeded"
            | "MessageRateExceeded" => FailureKind::Transient,
            _ => FailureKind::Unknown,
        }
    }

    fn outcome(result: MulticastResult) -> SendOutcome {
        match result.error {
            None => SendOutcome::Success,
            Some(reason) => SendOutcome::Failure {
                kind: Self::classify(&reason),
                reason,
            },
        }
    }
}

#[async_trait]
impl MulticastSender for FcmSender {
    #[instrument(skip(self, tokens, message), fields(tokens = tokens.len()))]
    async fn send_multicast(
        &self,
        tokens: &[String],
        message: &PushMessage,
    ) -> Result<Vec<SendOutcome>, TransportError> {
        if tokens.len() > MULTICAST_LIMIT {
            return Err(TransportError::TooManyTokens(tokens.len()));
        }

        let request = MulticastRequest {
            registration_ids: tokens,
            data: &message.data,
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .header(AUTHORIZATION, format!("key={}", self.server_key))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: MulticastResponse = response.json().await?;
        trace!(results = parsed.results.len(), "Received multicast response");

        if parsed.results.len() != tokens.len() {
            return Err(TransportError::MalformedResponse(format!(
                "expected {} results, got {}",
                tokens.len(),
                parsed.results.len()
            )));
        }

        Ok(parsed.results.into_iter().map(Self::outcome).collect())
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn classify_provider_errors() {
        assert_eq!(FcmSender::classify("NotRegistered"), FailureKind::PermanentInvalid);
        assert_eq!(FcmSender::classify("InvalidRegistration"), FailureKind::PermanentInvalid);
        assert_eq!(FcmSender::classify("Unavailable"), FailureKind::Transient);
        assert_eq!(FcmSender::classify("MessageRateExceeded"), FailureKind::Transient);
        assert_eq!(FcmSender::classify("MismatchSenderId"), FailureKind::Unknown);
    }

    #[test]
    fn keep_result_positions() {
        let response: MulticastResponse = serde_json::from_str(
            r#"{"multicast_id":1,"success":2,"failure":1,"results":[
                {"message_id":"a"},{"error":"NotRegistered"},{"message_id":"c"}
            ]}"#,
        )
        .unwrap();

        let outcomes: Vec<SendOutcome> =
            response.results.into_iter().map(FcmSender::outcome).collect();

        assert_eq!(
            outcomes,
            vec![
                SendOutcome::Success,
                SendOutcome::Failure {
                    kind: FailureKind::PermanentInvalid,
                    reason: "NotRegistered".into()
                },
                SendOutcome::Success,
            ]
        );
        assert!(outcomes[1].is_permanently_invalid());
    }

    #[tokio::test]
    async fn refuse_oversized_batches() {
        let sender = FcmSender::new(
            "http://localhost:1/fcm/send".parse().unwrap(),
            "key".into(),
            Duration::from_secs(1),
        )
        .unwrap();

        let tokens = vec![String::new(); MULTICAST_LIMIT + 1];
        let result = sender.send_multicast(&tokens, &PushMessage::default()).await;

        assert!(matches!(result, Err(TransportError::TooManyTokens(501))));
    }
}
