//! Background continuations that run after intake.

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::decoder::Decoder;
use crate::filter::Evaluator;
use crate::mail::{EmailId, StoragePointer};
use crate::objects::ObjectStore;
use crate::{Error, Result};

/// Work queued for an email after its record exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundTask {
    /// Decode the raw message into body fields and attachments.
    Decode {
        /// Target email.
        email_id: EmailId,
        /// Where the raw message is stored.
        pointer: StoragePointer,
    },
    /// Apply filter rules.
    Evaluate {
        /// Target email.
        email_id: EmailId,
    },
}

/// Accepts background tasks.
pub trait TaskQueue: Send + Sync {
    /// Queue a task.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue no longer accepts tasks.
    fn submit(&self, task: InboundTask) -> Result<()>;
}

/// Queue backed by an unbounded channel, drained by [`run_worker`].
#[derive(Debug, Clone)]
pub struct ChannelQueue {
    sender: mpsc::UnboundedSender<InboundTask>,
}

impl ChannelQueue {
    /// Create a queue and the receiver to hand to [`run_worker`].
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<InboundTask>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl TaskQueue for ChannelQueue {
    fn submit(&self, task: InboundTask) -> Result<()> {
        self.sender.send(task).map_err(|_| Error::QueueClosed)
    }
}

/// Runs tasks against the decoder and evaluator.
#[derive(Debug, Clone)]
pub struct Processor<S> {
    decoder: Decoder<S>,
    evaluator: Evaluator,
}

impl<S: ObjectStore> Processor<S> {
    /// Create a processor.
    #[must_use]
    pub const fn new(decoder: Decoder<S>, evaluator: Evaluator) -> Self {
        Self { decoder, evaluator }
    }

    /// Run one task to completion. Failures are logged, never retried.
    pub async fn run(&self, task: InboundTask) {
        match task {
            InboundTask::Decode { email_id, pointer } => {
                if let Err(e) = self.decoder.decode(email_id, &pointer).await {
                    warn!("Decoding email {email_id} failed: {e}");
                }
            }
            InboundTask::Evaluate { email_id } => match self.evaluator.evaluate(email_id).await {
                Ok(matched) => debug!("Email {email_id} matched {} filter(s)", matched.len()),
                Err(e) => warn!("Filtering email {email_id} failed: {e}"),
            },
        }
    }
}

/// Drain `receiver`, running each task concurrently.
///
/// Returns once every sender is dropped and all started tasks have finished.
pub async fn run_worker<S>(mut receiver: mpsc::UnboundedReceiver<InboundTask>, processor: Processor<S>)
where
    S: ObjectStore + Clone + 'static,
{
    let mut running = JoinSet::new();

    loop {
        tokio::select! {
            task = receiver.recv() => {
                let Some(task) = task else { break };
                let processor = processor.clone();
                running.spawn(async move { processor.run(task).await });
            }
            Some(finished) = running.join_next(), if !running.is_empty() => {
                if let Err(e) = finished {
                    warn!("Background task panicked: {e}");
                }
            }
        }
    }

    while let Some(finished) = running.join_next().await {
        if let Err(e) = finished {
            warn!("Background task panicked: {e}");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_queue_delivers_in_order() {
        let (queue, mut receiver) = ChannelQueue::new();
        queue
            .submit(InboundTask::Evaluate {
                email_id: EmailId::new(1),
            })
            .unwrap();
        queue
            .submit(InboundTask::Evaluate {
                email_id: EmailId::new(2),
            })
            .unwrap();

        assert_eq!(
            receiver.recv().await.unwrap(),
            InboundTask::Evaluate {
                email_id: EmailId::new(1)
            }
        );
        assert_eq!(
            receiver.recv().await.unwrap(),
            InboundTask::Evaluate {
                email_id: EmailId::new(2)
            }
        );
    }

    #[tokio::test]
    async fn test_closed_queue_rejects_tasks() {
        let (queue, receiver) = ChannelQueue::new();
        drop(receiver);
        assert!(matches!(
            queue.submit(InboundTask::Evaluate {
                email_id: EmailId::new(1)
            }),
            Err(Error::QueueClosed)
        ));
    }
}
