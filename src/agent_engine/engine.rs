use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::agent_engine::loop_control::{Admission, LoopGuard};
use crate::agent_engine::state::{Action, TaskPhase, TaskState, TaskStatus};
use crate::config::AppConfig;
use crate::executor::bridge::DeviceBridge;
use crate::executor::coordinator::within_device_bounds;
use crate::llm::action_parser;
use crate::llm::prompts::build_step_prompt;
use crate::llm::provider::VisionModel;
use crate::perception::artifacts::ArtifactDirs;
use crate::perception::image_prep::prepare_for_model;
use crate::perception::pipeline::{observe, Observation};
use crate::perception::ranker::{generate_fallback_action, search_action};
use crate::perception::stability::screen_fingerprint;

const FIXED_FALLBACK_LEN: usize = 4;

/// Outcome of one `run_task` call.
#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub run_id: Uuid,
    pub instruction: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Steps actually started, stalled ones included.
    pub steps: u32,
    pub phase: TaskPhase,
    pub status: TaskStatus,
}

impl TaskReport {
    pub fn summary(&self) -> String {
        self.status.summary()
    }
}

/// Which tier produced a step's action. Logged only.
#[derive(Debug, Clone, Copy)]
enum Tier {
    Stall,
    Vision,
    Ui,
    Fixed,
}

/// Runs one task at a time against a device: observe, decide, vet, execute.
pub struct AgentEngine {
    bridge: Arc<dyn DeviceBridge>,
    vision: Arc<dyn VisionModel>,
    config: AppConfig,
    dirs: ArtifactDirs,
    guard: LoopGuard,
}

impl AgentEngine {
    pub fn new(
        config: AppConfig,
        bridge: Arc<dyn DeviceBridge>,
        vision: Arc<dyn VisionModel>,
    ) -> Self {
        let dirs = ArtifactDirs::new(&config.agent.screenshot_dir, &config.agent.ui_dump_dir);
        let guard = LoopGuard::new(config.agent.max_action_repetitions);
        Self {
            bridge,
            vision,
            config,
            dirs,
            guard,
        }
    }

    /// Drives `instruction` until completion, launch failure or the step
    /// budget runs out. Never returns an error: every per-step failure
    /// degrades to the next decision tier.
    pub async fn run_task(&self, instruction: &str) -> TaskReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let mut state = TaskState::new(self.config.agent.max_steps);
        tracing::info!(%run_id, instruction, max_steps = state.max_steps, "task started");

        if let Err(e) = self.dirs.ensure() {
            tracing::warn!(error = %e, "artifact directories unavailable");
        }

        let launched = match app_for_instruction(&self.config.apps, instruction) {
            Some(package) => {
                let ok = self.bridge.launch(package).await;
                if ok {
                    tracing::info!(package, "target application launched");
                } else {
                    tracing::error!(package, "target application failed to launch");
                }
                ok
            }
            None => true,
        };
        let status = if launched {
            self.step_loop(instruction, &mut state).await
        } else {
            TaskStatus::LaunchFailed
        };

        let report = TaskReport {
            run_id,
            instruction: instruction.to_string(),
            started_at,
            finished_at: Utc::now(),
            steps: state.step,
            phase: state.phase,
            status,
        };
        tracing::info!(
            %run_id,
            steps = report.steps,
            phase = ?report.phase,
            result = %report.summary(),
            "task finished"
        );
        report
    }

    async fn step_loop(&self, instruction: &str, state: &mut TaskState) -> TaskStatus {
        loop {
            if state.budget_exhausted() {
                return TaskStatus::Exhausted { steps: state.step };
            }
            let step = state.advance_step();
            tracing::info!(step, max_steps = state.max_steps, phase = ?state.phase, "step started");

            let observation = observe(self.bridge.as_ref(), &self.dirs, step).await;
            let (candidate, tier) = self.decide(instruction, state, &observation).await;

            if let Action::Complete { message } = candidate {
                tracing::info!(step, ?tier, message = %message, "task completion reported");
                return TaskStatus::Completed { message };
            }

            let action = match self.guard.admit(candidate, &mut state.action_history) {
                Admission::Execute(action) => action,
                Admission::Substitute(action) => {
                    tracing::info!(step, ?tier, "candidate replaced by loop guard");
                    action
                }
            };

            tracing::info!(step, ?tier, action = %action, "executing");
            self.execute(&action).await;
            state.advance_phase(&action);
        }
    }

    /// Picks the step's candidate from the first tier that yields one.
    async fn decide(
        &self,
        instruction: &str,
        state: &mut TaskState,
        observation: &Observation,
    ) -> (Action, Tier) {
        if let Some(frame) = observation.screenshot.as_deref() {
            let fingerprint = screen_fingerprint(frame);
            if state.is_stalled(&fingerprint) {
                tracing::warn!(step = state.step, fingerprint = %&fingerprint[..12], "screen stalled");
                return (Action::scroll_down(), Tier::Stall);
            }
            state.record_fingerprint(fingerprint);

            if let Some(action) = self.vision_tier(instruction, state, frame).await {
                return (action, Tier::Vision);
            }
        }

        if let Some(elements) = observation.elements.as_deref() {
            let action = match state.phase {
                TaskPhase::SearchPending => search_action(elements),
                _ => None,
            }
            .or_else(|| generate_fallback_action(elements, state.step_index()));
            if let Some(action) = action {
                return (action, Tier::Ui);
            }
            tracing::debug!(step = state.step, elements = elements.len(), "no usable UI element");
        }

        (fixed_fallback(state.step_index()), Tier::Fixed)
    }

    async fn vision_tier(&self, instruction: &str, state: &TaskState, frame: &[u8]) -> Option<Action> {
        let vision = &self.config.vision;
        let prepared = match prepare_for_model(frame, vision.max_image_dimension, vision.jpeg_quality) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(step = state.step, error = %e, "screenshot undecodable, skipping vision");
                return None;
            }
        };

        let prompt = build_step_prompt(
            instruction,
            state.step,
            self.config.agent.prompt_step_cap,
            state.phase,
        );
        let reply = match self.vision.complete(&prepared.jpeg_bytes, &prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(step = state.step, model = self.vision.name(), error = %e, "vision model unavailable");
                return None;
            }
        };

        let parsed = action_parser::parse(&reply, prepared.scale);
        if parsed.is_none() {
            tracing::info!(step = state.step, reply = %reply, "vision reply had no action");
        }
        parsed
    }

    async fn execute(&self, action: &Action) {
        match action {
            Action::Tap { x, y, .. } => {
                let device = &self.config.device;
                if !within_device_bounds(*x, *y, device.screen_width, device.screen_height) {
                    tracing::warn!(x, y, "tap outside the expected screen area");
                }
                self.bridge.tap(*x, *y).await;
            }
            Action::Type { text } => self.bridge.type_text(text).await,
            Action::Scroll { direction } => self.bridge.scroll(*direction).await,
            Action::Complete { .. } => {}
        }
    }
}

/// Package of the first configured app whose keyword appears in `instruction`.
pub fn app_for_instruction<'a>(
    apps: &'a BTreeMap<String, String>,
    instruction: &str,
) -> Option<&'a str> {
    let lowered = instruction.to_lowercase();
    apps.iter()
        .find(|(keyword, _)| lowered.contains(&keyword.to_lowercase()))
        .map(|(_, package)| package.as_str())
}

/// Last-resort action, cycled by step so a blind run still moves around.
fn fixed_fallback(step_index: usize) -> Action {
    let tap = |x, y, comment: &str| Action::Tap {
        x,
        y,
        comment: comment.to_string(),
    };
    match step_index % FIXED_FALLBACK_LEN {
        0 => tap(540, 150, "Fallback: top area"),
        1 => Action::scroll_down(),
        2 => tap(100, 300, "Fallback: left side"),
        _ => tap(540, 400, "Fallback: content area"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::path::Path;
    use std::sync::atomic::{AtomicU8, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::agent_engine::state::ScrollDirection;
    use crate::errors::{PilotError, PilotResult};

    #[derive(Debug, Clone, PartialEq)]
    enum Op {
        Launch(String),
        Tap(i32, i32),
        Type(String),
        Scroll(ScrollDirection),
    }

    struct FakeDevice {
        ops: Mutex<Vec<Op>>,
        frame: AtomicU8,
        frozen: bool,
        ui_xml: Option<String>,
        launch_ok: bool,
    }

    impl FakeDevice {
        fn new() -> Self {
            Self {
                ops: Mutex::new(Vec::new()),
                frame: AtomicU8::new(0),
                frozen: false,
                ui_xml: None,
                launch_ok: true,
            }
        }

        fn ops(&self) -> Vec<Op> {
            self.ops.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DeviceBridge for FakeDevice {
        async fn capture_screenshot(&self, path: &Path) -> bool {
            let shade = if self.frozen {
                0
            } else {
                self.frame.fetch_add(1, Ordering::SeqCst)
            };
            image::RgbImage::from_pixel(40, 80, image::Rgb([shade, shade, shade]))
                .save(path)
                .is_ok()
        }

        async fn capture_ui_snapshot(&self, path: &Path) -> bool {
            match &self.ui_xml {
                Some(xml) => std::fs::write(path, xml).is_ok(),
                None => false,
            }
        }

        async fn tap(&self, x: i32, y: i32) {
            self.ops.lock().unwrap().push(Op::Tap(x, y));
        }

        async fn type_text(&self, text: &str) {
            self.ops.lock().unwrap().push(Op::Type(text.to_string()));
        }

        async fn scroll(&self, direction: ScrollDirection) {
            self.ops.lock().unwrap().push(Op::Scroll(direction));
        }

        async fn launch(&self, package_id: &str) -> bool {
            self.ops.lock().unwrap().push(Op::Launch(package_id.to_string()));
            self.launch_ok
        }
    }

    /// Replays scripted replies, then fails like an unreachable endpoint.
    struct ScriptedVision {
        replies: Mutex<VecDeque<PilotResult<String>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedVision {
        fn new(replies: Vec<PilotResult<String>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn replying(lines: &[&str]) -> Self {
            Self::new(lines.iter().map(|l| Ok(l.to_string())).collect())
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl VisionModel for ScriptedVision {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _image_jpeg: &[u8], prompt: &str) -> PilotResult<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(PilotError::VisionModel("request timed out".into())))
        }
    }

    fn config(dir: &Path, max_steps: u32) -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.agent.max_steps = max_steps;
        cfg.agent.screenshot_dir = dir.join("shots");
        cfg.agent.ui_dump_dir = dir.join("dumps");
        cfg
    }

    async fn run(
        device: FakeDevice,
        vision: ScriptedVision,
        max_steps: u32,
        instruction: &str,
    ) -> (TaskReport, Arc<FakeDevice>, Arc<ScriptedVision>) {
        let dir = tempfile::tempdir().unwrap();
        let device = Arc::new(device);
        let vision = Arc::new(vision);
        let engine = AgentEngine::new(config(dir.path(), max_steps), device.clone(), vision.clone());
        let report = engine.run_task(instruction).await;
        (report, device, vision)
    }

    const SEARCH_BOX_DUMP: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<hierarchy rotation="0">
  <node text="" resource-id="" class="android.widget.FrameLayout" content-desc="" clickable="false" scrollable="false" bounds="[0,0][1080,1920]">
    <node text="" resource-id="com.shop:id/search_box" class="android.widget.EditText" content-desc="" clickable="true" scrollable="false" bounds="[50,50][350,110]" />
  </node>
</hierarchy>"#;

    #[tokio::test]
    async fn vision_tap_starts_search_phase() {
        let (report, device, vision) = run(
            FakeDevice::new(),
            ScriptedVision::replying(&["TAP (300,100) # search icon"]),
            1,
            "find watermelons",
        )
        .await;

        assert_eq!(device.ops(), vec![Op::Tap(300, 100)]);
        assert_eq!(report.phase, TaskPhase::SearchStarted);
        assert_eq!(report.status, TaskStatus::Exhausted { steps: 1 });
        assert!(vision.prompts()[0].starts_with("Task: find watermelons\nStep: 1/15\n"));
    }

    #[tokio::test]
    async fn next_prompt_follows_the_phase() {
        let (_, _, vision) = run(
            FakeDevice::new(),
            ScriptedVision::replying(&["TAP (300,100) # search bar", "TYPE 'watermelon'"]),
            2,
            "find watermelons",
        )
        .await;

        let prompts = vision.prompts();
        assert!(prompts[0].contains("search bar or search icon"));
        assert!(prompts[1].contains("text input field"));
    }

    #[tokio::test]
    async fn vision_failure_falls_back_to_search_candidate() {
        let device = FakeDevice {
            ui_xml: Some(SEARCH_BOX_DUMP.to_string()),
            ..FakeDevice::new()
        };
        let (report, device, _) =
            run(device, ScriptedVision::replying(&["SCROLL down"]), 2, "find watermelons").await;

        assert_eq!(
            device.ops(),
            vec![Op::Scroll(ScrollDirection::Down), Op::Tap(200, 80)]
        );
        assert_eq!(report.phase, TaskPhase::SearchStarted);
    }

    #[tokio::test]
    async fn blind_steps_cycle_fixed_fallbacks() {
        let (report, device, _) =
            run(FakeDevice::new(), ScriptedVision::new(Vec::new()), 4, "find watermelons").await;

        assert_eq!(
            device.ops(),
            vec![
                Op::Tap(540, 150),
                Op::Scroll(ScrollDirection::Down),
                Op::Tap(100, 300),
                Op::Tap(540, 400),
            ]
        );
        assert_eq!(
            report.summary(),
            "Task stopped after 4 steps without completion"
        );
    }

    #[tokio::test]
    async fn completion_message_is_returned_verbatim() {
        let (report, device, _) = run(
            FakeDevice::new(),
            ScriptedVision::replying(&["TASK_COMPLETE: Found 3 items"]),
            20,
            "find watermelons",
        )
        .await;

        assert_eq!(report.summary(), "Found 3 items");
        assert_eq!(report.steps, 1);
        assert!(device.ops().is_empty());
    }

    #[tokio::test]
    async fn launch_failure_ends_the_task() {
        let device = FakeDevice {
            launch_ok: false,
            ..FakeDevice::new()
        };
        let (report, device, vision) = run(
            device,
            ScriptedVision::new(Vec::new()),
            5,
            "Open Flipkart and find shoes",
        )
        .await;

        assert_eq!(report.status, TaskStatus::LaunchFailed);
        assert_eq!(report.summary(), "Failed to launch target application");
        assert_eq!(report.steps, 0);
        assert_eq!(device.ops(), vec![Op::Launch("com.flipkart.android".into())]);
        assert!(vision.prompts().is_empty());
    }

    #[tokio::test]
    async fn repeated_tap_is_replaced_by_scroll() {
        let (_, device, _) = run(
            FakeDevice::new(),
            ScriptedVision::replying(&[
                "TAP (50,50) # product",
                "TAP (50,50) # product",
                "TAP (50,50) # product",
            ]),
            3,
            "find watermelons",
        )
        .await;

        assert_eq!(
            device.ops(),
            vec![
                Op::Tap(50, 50),
                Op::Tap(50, 50),
                Op::Scroll(ScrollDirection::Down),
            ]
        );
    }

    #[tokio::test]
    async fn frozen_screen_scrolls_without_asking_the_model() {
        let device = FakeDevice {
            frozen: true,
            ..FakeDevice::new()
        };
        let (report, device, vision) = run(
            device,
            ScriptedVision::replying(&["TAP (10,10) # item", "TAP (20,20) # item"]),
            3,
            "find watermelons",
        )
        .await;

        assert_eq!(
            device.ops(),
            vec![
                Op::Tap(10, 10),
                Op::Scroll(ScrollDirection::Down),
                Op::Scroll(ScrollDirection::Down),
            ]
        );
        assert_eq!(vision.prompts().len(), 1);
        assert_eq!(report.steps, 3);
    }

    #[tokio::test]
    async fn out_of_bounds_tap_is_still_sent() {
        let (_, device, _) = run(
            FakeDevice::new(),
            ScriptedVision::replying(&["TAP (5000,5000) # far away"]),
            1,
            "find watermelons",
        )
        .await;
        assert_eq!(device.ops(), vec![Op::Tap(5000, 5000)]);
    }

    #[test]
    fn instruction_keywords_pick_the_app() {
        let apps = AppConfig::default().apps;
        assert_eq!(
            app_for_instruction(&apps, "Order biryani on ZOMATO"),
            Some("com.application.zomato")
        );
        assert_eq!(app_for_instruction(&apps, "find watermelons"), None);
    }
}
