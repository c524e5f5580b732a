/*!
 * Reply Obligation
 * The promise to answer the original caller exactly once
 */

use super::types::TaskReply;
use crate::core::errors::{RegistryError, RegistryResult};
use tokio::sync::oneshot;
use tracing::debug;

type ReplyFn = Box<dyn FnOnce(TaskReply) + Send>;

enum ReplySink {
    Channel(oneshot::Sender<TaskReply>),
    Callback(ReplyFn),
    /// Caller does not want the reply (internally issued tasks)
    Detached,
}

/// Opaque reference to the caller awaiting a task's reply
pub struct ReplyObligation {
    sink: Option<ReplySink>,
}

impl ReplyObligation {
    /// Obligation answered through a oneshot channel
    pub fn channel() -> (Self, oneshot::Receiver<TaskReply>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                sink: Some(ReplySink::Channel(tx)),
            },
            rx,
        )
    }

    /// Obligation answered by invoking a callback
    pub fn from_fn<F>(callback: F) -> Self
    where
        F: FnOnce(TaskReply) + Send + 'static,
    {
        Self {
            sink: Some(ReplySink::Callback(Box::new(callback))),
        }
    }

    /// Obligation nobody listens to
    pub fn detached() -> Self {
        Self {
            sink: Some(ReplySink::Detached),
        }
    }

    pub fn is_satisfied(&self) -> bool {
        self.sink.is_none()
    }

    /// Deliver the reply; a second delivery is rejected
    pub fn fulfill(&mut self, reply: TaskReply) -> RegistryResult<()> {
        let sink = self.sink.take().ok_or(RegistryError::AlreadyReplied)?;
        match sink {
            ReplySink::Channel(tx) => {
                if tx.send(reply).is_err() {
                    debug!("caller dropped its reply receiver");
                }
            }
            ReplySink::Callback(f) => f(reply),
            ReplySink::Detached => {}
        }
        Ok(())
    }
}

impl std::fmt::Debug for ReplyObligation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplyObligation")
            .field("satisfied", &self.is_satisfied())
            .finish()
    }
}
