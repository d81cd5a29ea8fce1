//! Job processing service for outbound notifications.
//!
//! Mail and push deliveries are queued in memory and processed by a small
//! worker pool. Submitters never observe the outcome: failures are logged and
//! dropped without retry.

use std::sync::Arc;

use apollusia_common::{AppError, AppResult};
use tokio::sync::{
    mpsc::{self, error::TrySendError},
    Semaphore,
};
use tracing::{debug, error, info, warn};

use crate::services::email::{EmailMessage, EmailService};
use crate::services::push_notification::{
    PushNotificationService, PushPayload, PushSubscription,
};

/// Maximum number of concurrent job workers.
const MAX_WORKERS: usize = 4;

/// Channel buffer size for jobs.
const JOB_BUFFER_SIZE: usize = 1000;

/// Job types that can be processed.
#[derive(Debug, Clone)]
pub enum Job {
    /// Deliver a rendered email.
    Mail(EmailMessage),
    /// Deliver a push notification to one subscription.
    Push {
        subscription: PushSubscription,
        payload: PushPayload,
    },
}

impl Job {
    const fn kind(&self) -> &'static str {
        match self {
            Self::Mail(_) => "mail",
            Self::Push { .. } => "push",
        }
    }
}

/// Job sender for enqueueing jobs.
#[derive(Clone)]
pub struct JobSender {
    sender: mpsc::Sender<Job>,
}

impl JobSender {
    /// Enqueue a job for processing.
    ///
    /// Never waits: when the queue is full or closed the job is dropped and
    /// `AppError::Queue` is returned.
    pub fn enqueue(&self, job: Job) -> AppResult<()> {
        let kind = job.kind();
        self.sender.try_send(job).map_err(|e| {
            let reason = match e {
                TrySendError::Full(_) => "queue is full",
                TrySendError::Closed(_) => "queue is closed",
            };
            warn!(kind, reason, "Dropping job");
            AppError::Queue(format!("{kind} job dropped: {reason}"))
        })
    }

    /// Enqueue an email.
    pub fn mail(&self, message: EmailMessage) -> AppResult<()> {
        self.enqueue(Job::Mail(message))
    }

    /// Enqueue a push notification.
    pub fn push(&self, subscription: PushSubscription, payload: PushPayload) -> AppResult<()> {
        self.enqueue(Job::Push {
            subscription,
            payload,
        })
    }
}

/// Job worker context containing services needed for job processing.
#[derive(Clone, Default)]
pub struct JobWorkerContext {
    pub email_service: Option<EmailService>,
    pub push_service: Option<PushNotificationService>,
}

/// Job processing service.
pub struct JobService {
    sender: mpsc::Sender<Job>,
    receiver: mpsc::Receiver<Job>,
}

impl JobService {
    /// Create a new job service.
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel(JOB_BUFFER_SIZE);
        Self { sender, receiver }
    }

    /// Get a job sender for enqueueing jobs.
    #[must_use]
    pub fn sender(&self) -> JobSender {
        JobSender {
            sender: self.sender.clone(),
        }
    }

    /// Start the job processor with the given context.
    /// This consumes the receiver and spawns worker tasks.
    pub fn start(self, context: JobWorkerContext) {
        let receiver = self.receiver;
        let context = Arc::new(context);

        tokio::spawn(async move {
            info!("Job worker starting with {} workers", MAX_WORKERS);
            run_job_processor(receiver, context).await;
            info!("Job worker stopped");
        });
    }

    #[cfg(test)]
    pub(crate) fn into_receiver(self) -> mpsc::Receiver<Job> {
        self.receiver
    }
}

impl Default for JobService {
    fn default() -> Self {
        Self::new()
    }
}

/// Run the job processor.
async fn run_job_processor(mut receiver: mpsc::Receiver<Job>, context: Arc<JobWorkerContext>) {
    let semaphore = Arc::new(Semaphore::new(MAX_WORKERS));

    while let Some(job) = receiver.recv().await {
        let Ok(permit) = semaphore.clone().acquire_owned().await else {
            break;
        };
        let ctx = context.clone();

        tokio::spawn(async move {
            let _permit = permit;
            process_job(job, &ctx).await;
        });
    }
}

/// Process a single job.
async fn process_job(job: Job, context: &JobWorkerContext) {
    let kind = job.kind();
    match job {
        Job::Mail(message) => {
            let Some(ref email_service) = context.email_service else {
                debug!(kind, to = %message.to, "Email service not configured, skipping");
                return;
            };
            let to = message.to.clone();
            match email_service.send(message).await {
                Ok(()) => debug!(kind, to = %to, "Email delivered"),
                Err(e) => error!(kind, to = %to, error = %e, "Failed to deliver email"),
            }
        }
        Job::Push {
            subscription,
            payload,
        } => {
            let Some(ref push_service) = context.push_service else {
                debug!(kind, "Push service not configured, skipping");
                return;
            };
            match push_service.send(&subscription, &payload).await {
                Ok(()) => debug!(kind, endpoint = %subscription.endpoint, "Push delivered"),
                Err(e) => error!(
                    kind,
                    endpoint = %subscription.endpoint,
                    error = %e,
                    "Failed to deliver push notification"
                ),
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn message() -> EmailMessage {
        EmailMessage {
            to_name: "Alice".to_string(),
            to: "alice@example.com".to_string(),
            subject: "Poll booked".to_string(),
            text_body: String::new(),
            html_body: String::new(),
        }
    }

    #[tokio::test]
    async fn test_job_sender_enqueue() {
        let service = JobService::new();
        let sender = service.sender();

        // Start with no services
        service.start(JobWorkerContext::default());

        assert!(sender.mail(message()).is_ok());
    }

    #[tokio::test]
    async fn test_enqueue_fails_after_receiver_dropped() {
        let service = JobService::new();
        let sender = service.sender();
        drop(service);

        assert!(matches!(sender.mail(message()), Err(AppError::Queue(_))));
    }

    #[tokio::test]
    async fn test_enqueue_drops_when_full() {
        let service = JobService::new();
        let sender = service.sender();
        // Receiver alive but never drained
        let mut receiver = service.into_receiver();

        for _ in 0..JOB_BUFFER_SIZE {
            sender.mail(message()).unwrap();
        }

        // Returns at once instead of waiting for a free slot
        assert!(matches!(sender.mail(message()), Err(AppError::Queue(_))));

        // Space frees up once a job is taken
        receiver.recv().await.unwrap();
        assert!(sender.mail(message()).is_ok());
    }

    #[tokio::test]
    async fn test_skips_mail_without_service() {
        // Must return without panicking or blocking
        process_job(Job::Mail(message()), &JobWorkerContext::default()).await;
    }
}
