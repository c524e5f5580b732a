/*!
 * Running Apps
 * Table of native processes the lifecycle kernel currently tracks
 */

use super::types::NativeClient;
use crate::core::types::{AppId, Pid};
use ahash::RandomState;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct RunningApps {
    clients: HashMap<AppId, NativeClient, RandomState>,
}

impl RunningApps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, client: NativeClient) -> Option<NativeClient> {
        self.clients.insert(client.app_id.clone(), client)
    }

    pub fn get(&self, app_id: &str) -> Option<&NativeClient> {
        self.clients.get(app_id)
    }

    pub fn get_mut(&mut self, app_id: &str) -> Option<&mut NativeClient> {
        self.clients.get_mut(app_id)
    }

    pub fn remove(&mut self, app_id: &str) -> Option<NativeClient> {
        self.clients.remove(app_id)
    }

    pub fn find_by_pid(&self, pid: Pid) -> Option<&NativeClient> {
        self.clients.values().find(|c| c.pid == pid)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Clients sorted by app id
    pub fn snapshot(&self) -> Vec<NativeClient> {
        let mut all: Vec<_> = self.clients.values().cloned().collect();
        all.sort_by(|a, b| a.app_id.cmp(&b.app_id));
        all
    }
}
