/*!
 * Lifecycle Task Registry
 *
 * Owns every in-flight task, the correlation-token index used to resume
 * suspended tasks, and the exactly-once reply discipline.
 */

use super::reply::ReplyObligation;
use super::types::{Task, TaskError, TaskReply, TaskRequest};
use crate::core::errors::{ErrorCode, RegistryError, RegistryResult};
use crate::core::id::{AtomicGenerator, CorrelationToken, TaskUid};
use crate::core::limits::FINALIZED_HISTORY;
use ahash::RandomState;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, error, info};

pub struct LifecycleTaskRegistry {
    tasks: HashMap<TaskUid, Task, RandomState>,
    tokens: HashMap<CorrelationToken, TaskUid, RandomState>,
    /// Recently finalized uids, oldest first
    finalized: VecDeque<TaskUid>,
    finalized_index: HashSet<TaskUid, RandomState>,
    history: usize,
    uids: AtomicGenerator<TaskUid>,
}

impl LifecycleTaskRegistry {
    pub fn new() -> Self {
        Self::with_history(FINALIZED_HISTORY)
    }

    /// Registry remembering `history` finalized uids for duplicate detection
    pub fn with_history(history: usize) -> Self {
        Self {
            tasks: HashMap::with_hasher(RandomState::new()),
            tokens: HashMap::with_hasher(RandomState::new()),
            finalized: VecDeque::with_capacity(history.min(1024)),
            finalized_index: HashSet::with_hasher(RandomState::new()),
            history: history.max(1),
            uids: AtomicGenerator::default(),
        }
    }

    /// Build and register a task for an inbound request
    pub fn admit(&mut self, request: TaskRequest, reply: ReplyObligation) -> TaskUid {
        let uid = self.uids.next();
        self.tasks.insert(uid, Task::new(uid, request, reply));
        uid
    }

    pub fn get(&self, uid: TaskUid) -> Option<&Task> {
        self.tasks.get(&uid)
    }

    pub fn get_mut(&mut self, uid: TaskUid) -> Option<&mut Task> {
        self.tasks.get_mut(&uid)
    }

    pub fn contains(&self, uid: TaskUid) -> bool {
        self.tasks.contains_key(&uid)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    /// Uids of all tasks currently awaiting a reply, in token order
    pub fn suspended(&self) -> Vec<(CorrelationToken, TaskUid)> {
        let mut pending: Vec<_> = self.tokens.iter().map(|(t, u)| (*t, *u)).collect();
        pending.sort();
        pending
    }

    /// Associate a correlation token with a suspended task
    pub fn bind_token(&mut self, uid: TaskUid, token: CorrelationToken) -> RegistryResult<()> {
        if self.tokens.contains_key(&token) {
            return Err(RegistryError::TokenInUse(token));
        }
        let task = self
            .tasks
            .get_mut(&uid)
            .ok_or(RegistryError::UnknownTask(uid))?;

        if let Some(previous) = task.correlation_token.replace(token) {
            self.tokens.remove(&previous);
        }
        self.tokens.insert(token, uid);
        debug!(uid = %uid, token = %token, "correlation token bound");
        Ok(())
    }

    /// Remove a token binding, returning the task it pointed at
    pub fn release_token(&mut self, token: CorrelationToken) -> Option<TaskUid> {
        let uid = self.tokens.remove(&token)?;
        if let Some(task) = self.tasks.get_mut(&uid) {
            if task.correlation_token == Some(token) {
                task.correlation_token = None;
            }
        }
        Some(uid)
    }

    pub fn find_by_correlation_token(&self, token: CorrelationToken) -> Option<&Task> {
        self.tokens.get(&token).and_then(|uid| self.tasks.get(uid))
    }

    /// Reply success and remove the task
    pub fn finalize(&mut self, uid: TaskUid) -> RegistryResult<Task> {
        self.complete(uid, None)
    }

    /// Reply failure and remove the task
    pub fn finalize_with_error(
        &mut self,
        uid: TaskUid,
        code: ErrorCode,
        text: impl Into<String>,
    ) -> RegistryResult<Task> {
        self.complete(
            uid,
            Some(TaskError {
                code,
                text: text.into(),
            }),
        )
    }

    /// Whether `uid` was finalized recently enough to be remembered
    pub fn was_finalized(&self, uid: TaskUid) -> bool {
        self.finalized_index.contains(&uid)
    }

    fn complete(&mut self, uid: TaskUid, failure: Option<TaskError>) -> RegistryResult<Task> {
        let Some(mut task) = self.tasks.remove(&uid) else {
            let err = if self.was_finalized(uid) {
                RegistryError::AlreadyFinalized(uid)
            } else {
                RegistryError::UnknownTask(uid)
            };
            error!(uid = %uid, error = %err, "rejected duplicate or unknown finalize");
            return Err(err);
        };

        if let Some(token) = task.correlation_token.take() {
            self.tokens.remove(&token);
        }

        let reply = match &failure {
            None => TaskReply::success(&task),
            Some(e) => TaskReply::failure(&task, e.code, e.text.clone()),
        };
        task.error = failure;

        if let Err(err) = task.reply.fulfill(reply) {
            error!(uid = %uid, error = %err, "reply obligation was already satisfied");
            self.remember(uid);
            return Err(RegistryError::AlreadyFinalized(uid));
        }

        match &task.error {
            None => info!(uid = %uid, app_id = %task.app_id, "task finalized"),
            Some(e) => info!(
                uid = %uid,
                app_id = %task.app_id,
                code = e.code.as_i32(),
                error = %e.text,
                "task finalized with error"
            ),
        }

        self.remember(uid);
        Ok(task)
    }

    fn remember(&mut self, uid: TaskUid) {
        if self.finalized_index.insert(uid) {
            self.finalized.push_back(uid);
        }
        while self.finalized.len() > self.history {
            if let Some(old) = self.finalized.pop_front() {
                self.finalized_index.remove(&old);
            }
        }
    }
}

impl Default for LifecycleTaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}
