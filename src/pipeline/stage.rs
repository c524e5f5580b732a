/*!
 * Stages and Stage Chains
 *
 * Stages are configuration data. The engine is generic over them: a chain
 * names its entry stage and every stage names its successor.
 */

use super::context::StageContext;
use crate::core::errors::{ChainError, LifecycleError};
use crate::core::id::CorrelationToken;
use crate::core::types::AppId;
use crate::ipc::OutboundRequest;
use crate::task::Task;
use ahash::RandomState;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Outcome of a stage step
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Advance to the next stage (or finish successfully at the end)
    Continue,
    /// Abort the task with this error
    Error(LifecycleError),
    /// Retarget the task and restart the chain from its entry stage
    Redirect(AppId),
}

impl From<Result<(), LifecycleError>> for Verdict {
    fn from(result: Result<(), LifecycleError>) -> Self {
        match result {
            Ok(()) => Verdict::Continue,
            Err(e) => Verdict::Error(e),
        }
    }
}

/// What an async stage's request builder asks the engine to do
#[derive(Debug)]
pub enum Dispatch {
    /// Send through the transport and suspend on the returned token
    Send {
        request: OutboundRequest,
        timeout: Option<Duration>,
    },
    /// Suspend on a token the stage already obtained
    Await {
        token: CorrelationToken,
        timeout: Option<Duration>,
    },
    /// Nothing to wait for after all
    Complete(Verdict),
}

/// Input to an async stage's response handler
#[derive(Debug, Clone, PartialEq)]
pub enum StageReply {
    Payload(Value),
    /// No reply arrived before the stage deadline
    TimedOut { after: Duration },
}

pub type DirectFn = Arc<dyn Fn(&mut Task, &mut StageContext) -> Verdict + Send + Sync>;
pub type RequestFn = Arc<dyn Fn(&mut Task, &mut StageContext) -> Dispatch + Send + Sync>;
pub type ResponseFn =
    Arc<dyn Fn(&mut Task, StageReply, &mut StageContext) -> Verdict + Send + Sync>;

#[derive(Clone)]
pub enum StageKind {
    Direct(DirectFn),
    AsyncCall {
        request: RequestFn,
        response: ResponseFn,
    },
}

/// One named unit of work in a chain
#[derive(Clone)]
pub struct Stage {
    pub name: &'static str,
    pub kind: StageKind,
    /// Successor on `Continue`; `None` finishes the task
    pub next: Option<&'static str>,
    /// Deadline for suspensions of this stage
    pub timeout: Option<Duration>,
}

impl Stage {
    pub fn direct<F>(name: &'static str, f: F) -> Self
    where
        F: Fn(&mut Task, &mut StageContext) -> Verdict + Send + Sync + 'static,
    {
        Self {
            name,
            kind: StageKind::Direct(Arc::new(f)),
            next: None,
            timeout: None,
        }
    }

    pub fn async_call<Req, Resp>(name: &'static str, request: Req, response: Resp) -> Self
    where
        Req: Fn(&mut Task, &mut StageContext) -> Dispatch + Send + Sync + 'static,
        Resp: Fn(&mut Task, StageReply, &mut StageContext) -> Verdict + Send + Sync + 'static,
    {
        Self {
            name,
            kind: StageKind::AsyncCall {
                request: Arc::new(request),
                response: Arc::new(response),
            },
            next: None,
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_next(mut self, next: &'static str) -> Self {
        self.next = Some(next);
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[inline]
    pub fn is_async(&self) -> bool {
        matches!(self.kind, StageKind::AsyncCall { .. })
    }
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stage")
            .field("name", &self.name)
            .field("async", &self.is_async())
            .field("next", &self.next)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Validated, immutable stage graph
#[derive(Debug)]
pub struct StageChain {
    name: &'static str,
    entry: &'static str,
    stages: HashMap<&'static str, Stage, RandomState>,
}

impl StageChain {
    /// Validate an explicit graph
    pub fn new(
        name: &'static str,
        entry: &'static str,
        stages: Vec<Stage>,
    ) -> Result<Arc<Self>, ChainError> {
        if stages.is_empty() {
            return Err(ChainError::Empty(name.to_string()));
        }

        let mut map = HashMap::with_capacity_and_hasher(stages.len(), RandomState::new());
        for stage in stages {
            let stage_name = stage.name;
            if map.insert(stage_name, stage).is_some() {
                return Err(ChainError::DuplicateStage(stage_name.to_string()));
            }
        }

        if !map.contains_key(entry) {
            return Err(ChainError::MissingEntry(entry.to_string()));
        }
        for stage in map.values() {
            if let Some(next) = stage.next {
                if !map.contains_key(next) {
                    return Err(ChainError::DanglingLink {
                        from: stage.name.to_string(),
                        to: next.to_string(),
                    });
                }
            }
        }

        Ok(Arc::new(Self {
            name,
            entry,
            stages: map,
        }))
    }

    /// Chain running `stages` in order; existing `next` links are overwritten
    pub fn linear(name: &'static str, mut stages: Vec<Stage>) -> Result<Arc<Self>, ChainError> {
        let entry = stages
            .first()
            .map(|s| s.name)
            .ok_or_else(|| ChainError::Empty(name.to_string()))?;

        let names: Vec<&'static str> = stages.iter().map(|s| s.name).collect();
        for (i, stage) in stages.iter_mut().enumerate() {
            stage.next = names.get(i + 1).copied();
        }
        Self::new(name, entry, stages)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn entry(&self) -> &'static str {
        self.entry
    }

    pub fn stage(&self, name: &str) -> Option<&Stage> {
        self.stages.get(name)
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
