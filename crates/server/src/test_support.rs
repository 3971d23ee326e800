//! In-process doubles for the outbound collaborators.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use aisdr_agent::{CompletionClient, CompletionFailure, CompletionRequest};
use aisdr_slack::{Delivery, InChannelMessage, Notifier, NotifyError};
use async_trait::async_trait;
use tokio::sync::Notify;

pub struct ScriptedCompletion {
    result: Result<String, CompletionFailure>,
    delay: Option<Duration>,
    requests: Mutex<Vec<CompletionRequest>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedCompletion {
    pub fn replying(text: &str) -> Self {
        Self::with_result(Ok(text.to_string()))
    }

    pub fn failing(failure: CompletionFailure) -> Self {
        Self::with_result(Err(failure))
    }

    fn with_result(result: Result<String, CompletionFailure>) -> Self {
        Self {
            result,
            delay: None,
            requests: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().expect("requests lock").len()
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletion {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionFailure> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        self.requests.lock().expect("requests lock").push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.result.clone()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notification {
    Channel { channel: String, text: String },
    ResponseUrl { url: String, response_type: String, text: String },
}

pub struct RecordingNotifier {
    reachable: bool,
    notifications: Mutex<Vec<Notification>>,
    signal: Notify,
}

impl RecordingNotifier {
    pub fn accepting() -> Self {
        Self { reachable: true, notifications: Mutex::new(Vec::new()), signal: Notify::new() }
    }

    pub fn unreachable() -> Self {
        Self { reachable: false, ..Self::accepting() }
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().expect("notifications lock").clone()
    }

    pub async fn wait_for(&self, count: usize) -> Vec<Notification> {
        loop {
            let current = self.notifications();
            if current.len() >= count {
                return current;
            }
            self.signal.notified().await;
        }
    }

    fn record(&self, notification: Notification) -> Result<Delivery, NotifyError> {
        if !self.reachable {
            let error = reqwest::Client::new()
                .post("unreachable slack")
                .build()
                .expect_err("relative url cannot build");
            return Err(match notification {
                Notification::Channel { .. } => NotifyError::SlackTransport(error),
                Notification::ResponseUrl { .. } => NotifyError::ResponseUrlTransport(error),
            });
        }

        self.notifications.lock().expect("notifications lock").push(notification);
        self.signal.notify_one();
        Ok(Delivery::Accepted)
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn post_message(&self, channel: &str, text: &str) -> Result<Delivery, NotifyError> {
        self.record(Notification::Channel { channel: channel.to_string(), text: text.to_string() })
    }

    async fn post_response(
        &self,
        response_url: &str,
        message: &InChannelMessage,
    ) -> Result<Delivery, NotifyError> {
        self.record(Notification::ResponseUrl {
            url: response_url.to_string(),
            response_type: message.response_type.clone(),
            text: message.text.clone(),
        })
    }
}
