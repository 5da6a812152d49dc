use std::path::Path;

use async_trait::async_trait;

use crate::agent_engine::state::ScrollDirection;

/// Device transport consumed by the agent engine.
///
/// Every call is best-effort: `false` (or a silently failed action) means
/// "nothing this step", never a reason to abort the task. Implementations
/// own their timeouts and retries.
#[async_trait]
pub trait DeviceBridge: Send + Sync {
    /// Writes a PNG screenshot to `path`.
    async fn capture_screenshot(&self, path: &Path) -> bool;

    /// Writes a UI hierarchy XML dump to `path`.
    async fn capture_ui_snapshot(&self, path: &Path) -> bool;

    async fn tap(&self, x: i32, y: i32);

    async fn type_text(&self, text: &str);

    async fn scroll(&self, direction: ScrollDirection);

    /// Starts the app from a clean state.
    async fn launch(&self, package_id: &str) -> bool;
}
