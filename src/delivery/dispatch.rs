use std::sync::Arc;

use tokio::{sync::mpsc, task::JoinSet};

use crate::task::{Task, TaskId};

use super::{EmailTransport, MessageComposer, NotificationEmitter};

#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub task: Task,
    pub recipients: Vec<String>,
}

/// Outcome of one reminder delivery across both channels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub task_id: TaskId,
    pub notified: bool,
    pub delivered: Vec<String>,
    pub failed: Vec<(String, String)>,
}

pub struct DeliveryContext {
    pub notifier: Arc<dyn NotificationEmitter>,
    pub transport: Arc<dyn EmailTransport>,
    pub composer: MessageComposer,
}

/// Handle to the dispatch worker. Requests are queued without waiting for delivery.
#[derive(Clone)]
pub struct DispatchSink {
    sender: mpsc::UnboundedSender<DispatchRequest>,
}

impl DispatchSink {
    pub fn spawn(context: DeliveryContext) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(run_dispatch_worker(receiver, Arc::new(context)));

        Self { sender }
    }

    pub fn dispatch(&self, request: DispatchRequest) {
        let task_id = request.task.id.clone();
        if self.sender.send(request).is_err() {
            log::error!("Dispatch worker is gone, reminder dropped. [task_id = {task_id}]");
        }
    }
}

async fn run_dispatch_worker(
    mut receiver: mpsc::UnboundedReceiver<DispatchRequest>,
    context: Arc<DeliveryContext>,
) {
    while let Some(request) = receiver.recv().await {
        let context = Arc::clone(&context);
        tokio::spawn(async move {
            let report = deliver(request, &context).await;
            log::info!(
                "Reminder delivered. [task_id = {}, notified = {}, delivered = {}, failed = {}]",
                report.task_id,
                report.notified,
                report.delivered.len(),
                report.failed.len()
            );
        });
    }

    log::info!("Dispatch worker shutting down");
}

/// Shows the local notification and submits one email per recipient.
/// Recipients are submitted concurrently and fail independently.
pub async fn deliver(request: DispatchRequest, context: &DeliveryContext) -> DeliveryReport {
    let DispatchRequest { task, recipients } = request;
    let mut report = DeliveryReport {
        task_id: task.id.clone(),
        ..Default::default()
    };

    report.notified = notify_locally(&task, context).await;

    let mut submissions = JoinSet::new();
    for recipient in recipients {
        let transport = Arc::clone(&context.transport);
        let message = context.composer.reminder_email(&task, &recipient);
        submissions.spawn(async move {
            let outcome = transport.submit(&message).await;
            (message.recipient, outcome)
        });
    }

    while let Some(joined) = submissions.join_next().await {
        match joined {
            Ok((recipient, Ok(()))) => {
                log::info!(
                    "Email reminder sent. [task_id = {}, recipient = {}]",
                    task.id,
                    recipient
                );
                report.delivered.push(recipient);
            }
            Ok((recipient, Err(err))) => {
                log::error!(
                    "Email reminder failed. [task_id = {}, recipient = {}, error = {}]",
                    task.id,
                    recipient,
                    err
                );
                report.failed.push((recipient, err.to_string()));
            }
            Err(err) => {
                log::error!("Email submission task did not finish. [task_id = {}, error = {}]", task.id, err);
            }
        }
    }

    report.delivered.sort();
    report.failed.sort();
    report
}

async fn notify_locally(task: &Task, context: &DeliveryContext) -> bool {
    if !context.notifier.is_available() {
        log::debug!("Local notifications unavailable, skipping. [task_id = {}]", task.id);
        return false;
    }

    let notifier = Arc::clone(&context.notifier);
    let notification = context.composer.reminder_notification(task);
    match tokio::task::spawn_blocking(move || notifier.show(&notification)).await {
        Ok(Ok(())) => true,
        Ok(Err(err)) => {
            log::warn!("Local notification failed. [task_id = {}, error = {:#}]", task.id, err);
            false
        }
        Err(err) => {
            log::warn!("Local notification task did not finish. [task_id = {}, error = {}]", task.id, err);
            false
        }
    }
}
