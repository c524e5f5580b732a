/*!
 * App Directory Traits
 */

use super::types::AppDescriptor;

/// Application descriptor lookup
pub trait AppDirectory: Send + Sync {
    fn get_app_by_id(&self, id: &str) -> Option<AppDescriptor>;
}
