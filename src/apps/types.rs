/*!
 * App Descriptor Types
 */

use crate::core::types::AppId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Capability flags of an installed application
///
/// Read by the pipeline and the native protocol adapters, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppDescriptor {
    pub id: AppId,
    pub exec_path: PathBuf,
    /// Declared native interface generation; selects the protocol adapter
    #[serde(default = "default_interface_version")]
    pub native_interface_version: i32,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub removable: bool,
    #[serde(default)]
    pub system: bool,
    /// Launches of this app are forwarded to another app
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect: Option<AppId>,
}

fn default_interface_version() -> i32 {
    crate::core::limits::NATIVE_INTERFACE_V1
}

impl AppDescriptor {
    pub fn new(id: impl Into<AppId>, exec_path: impl Into<PathBuf>, version: i32) -> Self {
        Self {
            id: id.into(),
            exec_path: exec_path.into(),
            native_interface_version: version,
            locked: false,
            removable: true,
            system: false,
            redirect: None,
        }
    }

    #[must_use]
    pub fn locked(mut self) -> Self {
        self.locked = true;
        self
    }

    #[must_use]
    pub fn system(mut self) -> Self {
        self.system = true;
        self.removable = false;
        self
    }

    #[must_use]
    pub fn redirect_to(mut self, target: impl Into<AppId>) -> Self {
        self.redirect = Some(target.into());
        self
    }
}
