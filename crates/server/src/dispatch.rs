use std::sync::Arc;
use std::time::Instant;

use aisdr_agent::{CompletionClient, CompletionFailure, PromptRenderer};
use aisdr_core::errors::{ErrorSite, APOLOGY_TEXT};
use aisdr_core::ProspectFields;
use aisdr_slack::{Delivery, InChannelMessage, Notifier, NotifyError};
use aisdr_telemetry::propagation::record_trace_id;
use aisdr_telemetry::{Destination, TelemetryContext, Trigger};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{error, field::Empty, info, info_span, warn, Instrument, Span};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplyTarget {
    Channel(String),
    ResponseUrl(String),
}

#[derive(Clone, Debug)]
pub struct DispatchJob {
    pub trigger: Trigger,
    pub raw_text: String,
    pub target: ReplyTarget,
    pub correlation_id: String,
}

/// Failures that escape a work unit. Provider-side completion failures never get here;
/// they are answered with the apology text instead.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Completion(CompletionFailure),
    #[error(transparent)]
    Notify(#[from] NotifyError),
}

impl DispatchError {
    pub fn site(&self) -> ErrorSite {
        match self {
            Self::Completion(failure) => failure.site(),
            Self::Notify(NotifyError::SlackTransport(_)) => ErrorSite::SlackTransport,
            Self::Notify(NotifyError::ResponseUrlTransport(_)) => ErrorSite::ResponseUrlTransport,
        }
    }
}

/// Runs extract, complete, notify off the request path. `dispatch` never waits for
/// the work; its outcome is only visible through telemetry and the reply itself.
#[derive(Clone)]
pub struct BackgroundDispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    completion: Arc<dyn CompletionClient>,
    notifier: Arc<dyn Notifier>,
    prompts: Arc<PromptRenderer>,
    telemetry: Arc<TelemetryContext>,
    limit: Option<Arc<Semaphore>>,
}

impl BackgroundDispatcher {
    /// `max_concurrency == 0` leaves the number of in-flight units unbounded.
    pub fn new(
        completion: Arc<dyn CompletionClient>,
        notifier: Arc<dyn Notifier>,
        prompts: Arc<PromptRenderer>,
        telemetry: Arc<TelemetryContext>,
        max_concurrency: usize,
    ) -> Self {
        let limit = (max_concurrency > 0).then(|| Arc::new(Semaphore::new(max_concurrency)));
        Self {
            inner: Arc::new(DispatcherInner { completion, notifier, prompts, telemetry, limit }),
        }
    }

    pub fn dispatch(&self, job: DispatchJob) -> JoinHandle<()> {
        let span = info_span!(
            "background.task",
            trigger = job.trigger.as_label(),
            correlation_id = %job.correlation_id,
            otel.status_code = Empty,
            trace_id = Empty,
        );
        record_trace_id(&span);

        let inner = Arc::clone(&self.inner);
        tokio::spawn(
            async move {
                let _permit = match inner.limit.as_ref() {
                    Some(limit) => Arc::clone(limit).acquire_owned().await.ok(),
                    None => None,
                };

                let metrics = inner.telemetry.business_metrics();
                let started = Instant::now();
                metrics.record_task_started(job.trigger);

                let result = inner.run(&job).await;
                metrics.record_task_duration(job.trigger, started.elapsed());

                match result {
                    Ok(()) => info!(
                        event_name = "background.task.completed",
                        correlation_id = %job.correlation_id,
                        "background task completed"
                    ),
                    Err(failure) => {
                        metrics.record_error(failure.site());
                        Span::current().record("otel.status_code", "ERROR");
                        error!(
                            event_name = "background.task.failed",
                            correlation_id = %job.correlation_id,
                            error_type = failure.site().as_label(),
                            error = %failure,
                            "background task failed"
                        );
                    }
                }
            }
            .instrument(span),
        )
    }
}

impl DispatcherInner {
    async fn run(&self, job: &DispatchJob) -> Result<(), DispatchError> {
        let fields = ProspectFields::extract(&job.raw_text);
        let text = self.generate(&fields).await?;
        self.deliver(&job.target, &text).await
    }

    async fn generate(&self, fields: &ProspectFields) -> Result<String, DispatchError> {
        let metrics = self.telemetry.business_metrics();

        let request = match self.prompts.render(fields) {
            Ok(request) => request,
            Err(error) => {
                metrics.record_error(ErrorSite::PromptRender);
                warn!(event_name = "prompt.render.failed", error = %error, "prompt rendering failed");
                return Ok(APOLOGY_TEXT.to_owned());
            }
        };

        let span = info_span!(
            "openai.generate_email",
            competitor = %fields.competitor_tool,
            otel.status_code = Empty,
        );

        async {
            let started = Instant::now();
            let result = self.completion.complete(&request).await;
            metrics.record_completion_request(&fields.competitor_tool, started.elapsed());

            match result {
                Ok(text) => {
                    metrics.record_email_generated(&fields.competitor_tool);
                    Ok(text)
                }
                Err(failure @ CompletionFailure::Transport(_)) => {
                    Span::current().record("otel.status_code", "ERROR");
                    Err(DispatchError::Completion(failure))
                }
                Err(failure) => {
                    metrics.record_error(failure.site());
                    warn!(
                        event_name = "openai.response.unusable",
                        error_type = failure.site().as_label(),
                        error = %failure,
                        "answering with apology"
                    );
                    Ok(failure.site().user_message().to_owned())
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn deliver(&self, target: &ReplyTarget, text: &str) -> Result<(), DispatchError> {
        let (delivery, destination) = match target {
            ReplyTarget::Channel(channel) => {
                (self.notifier.post_message(channel, text).await?, Destination::Channel)
            }
            ReplyTarget::ResponseUrl(url) => (
                self.notifier.post_response(url, &InChannelMessage::new(text)).await?,
                Destination::ResponseUrl,
            ),
        };

        if delivery == Delivery::Accepted {
            self.telemetry.business_metrics().record_message_sent(destination);
        }
        Ok(())
    }
}
