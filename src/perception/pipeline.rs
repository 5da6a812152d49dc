use crate::executor::bridge::DeviceBridge;
use crate::perception::artifacts::ArtifactDirs;
use crate::perception::types::UIElement;
use crate::perception::ui_hierarchy::parse_hierarchy;

/// What one step managed to see. Each half is independently optional.
#[derive(Debug, Clone, Default)]
pub struct Observation {
    pub screenshot: Option<Vec<u8>>,
    pub elements: Option<Vec<UIElement>>,
}

/// Captures the screenshot and the UI hierarchy for `step`, then loads them.
/// Any failure leaves that half empty; nothing here aborts the task.
pub async fn observe(bridge: &dyn DeviceBridge, dirs: &ArtifactDirs, step: u32) -> Observation {
    // Step 1: screenshot
    let shot_path = dirs.screenshot_path(step);
    let screenshot = if bridge.capture_screenshot(&shot_path).await {
        match tokio::fs::read(&shot_path).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::warn!(step, path = %shot_path.display(), error = %e, "screenshot unreadable");
                None
            }
        }
    } else {
        tracing::warn!(step, "screenshot capture failed");
        None
    };

    // Step 2: UI hierarchy
    let dump_path = dirs.ui_dump_path(step);
    let elements = if bridge.capture_ui_snapshot(&dump_path).await {
        match tokio::fs::read_to_string(&dump_path).await {
            Ok(xml) => match parse_hierarchy(&xml) {
                Ok(elements) => Some(elements),
                Err(e) => {
                    tracing::warn!(step, error = %e, "UI hierarchy unparseable");
                    None
                }
            },
            Err(e) => {
                tracing::warn!(step, path = %dump_path.display(), error = %e, "UI dump unreadable");
                None
            }
        }
    } else {
        tracing::warn!(step, "UI hierarchy capture failed");
        None
    };

    tracing::debug!(
        step,
        screenshot = screenshot.is_some(),
        elements = elements.as_ref().map(Vec::len),
        "observation complete"
    );
    Observation {
        screenshot,
        elements,
    }
}
