//! [`DeviceBridge`] over the `adb` command-line tool.
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::agent_engine::state::ScrollDirection;
use crate::config::DeviceConfig;
use crate::errors::{PilotError, PilotResult};
use crate::executor::bridge::DeviceBridge;
use crate::executor::retry::RetryPolicy;
use crate::executor::text_input::escape_for_input;

const REMOTE_SCREENSHOT: &str = "/sdcard/screenshot.png";
const REMOTE_UI_DUMP: &str = "/sdcard/ui_dump.xml";
const REMOTE_UI_PROBE: &str = "/sdcard/ui_test.xml";
/// Smaller files are truncated or error pages, not real captures.
const MIN_SCREENSHOT_BYTES: u64 = 1000;
const MIN_UI_DUMP_BYTES: u64 = 100;
const CAPTURE_TIMEOUT: Duration = Duration::from_secs(10);

pub struct AdbBridge {
    adb_path: String,
    serial: String,
    command_timeout: Duration,
    retry: RetryPolicy,
    settle: Duration,
    launch_settle: Duration,
}

impl AdbBridge {
    /// Picks the configured device (or the first attached one) and checks
    /// that UIAutomator answers.
    pub async fn connect(cfg: &DeviceConfig) -> PilotResult<Self> {
        let command_timeout = Duration::from_secs(cfg.command_timeout_secs);
        let serial = match &cfg.serial {
            Some(serial) => serial.clone(),
            None => discover_device(&cfg.adb_path, command_timeout).await?,
        };
        tracing::info!(serial = %serial, "android device selected");

        let bridge = Self {
            adb_path: cfg.adb_path.clone(),
            serial,
            command_timeout,
            retry: RetryPolicy::new(cfg.capture_attempts, Duration::from_millis(cfg.retry_delay_ms)),
            settle: Duration::from_millis(cfg.settle_ms),
            launch_settle: Duration::from_millis(cfg.launch_settle_ms),
        };
        bridge.verify_uiautomator().await;
        Ok(bridge)
    }

    async fn verify_uiautomator(&self) {
        match self.shell(&["uiautomator", "dump", REMOTE_UI_PROBE]).await {
            Ok(out) if out.to_lowercase().contains("dumped") => {
                tracing::debug!("uiautomator responded");
            }
            Ok(out) => tracing::warn!(output = %out, "uiautomator may not be working"),
            Err(e) => tracing::warn!(error = %e, "uiautomator check failed"),
        }
    }

    async fn run(&self, args: &[&str], timeout: Duration) -> PilotResult<String> {
        let mut cmd = Command::new(&self.adb_path);
        cmd.arg("-s").arg(&self.serial).args(args).kill_on_drop(true);
        run_command(cmd, args, timeout).await
    }

    async fn shell(&self, args: &[&str]) -> PilotResult<String> {
        let mut full = Vec::with_capacity(args.len() + 1);
        full.push("shell");
        full.extend_from_slice(args);
        self.run(&full, self.command_timeout).await
    }

    /// Runs `produce` on the device to write `remote`, pulls it to `local`
    /// and accepts the result once it is larger than `min_bytes`.
    async fn capture_file(
        &self,
        label: &str,
        produce: &[&str],
        remote: &str,
        local: &Path,
        min_bytes: u64,
    ) -> bool {
        let local_arg = local.to_string_lossy().into_owned();
        self.retry
            .run(label, |_| {
                let local_arg = local_arg.as_str();
                async move {
                    let _ = self.shell(&["rm", "-f", remote]).await;
                    if let Err(e) = self.run(produce, CAPTURE_TIMEOUT.max(self.command_timeout)).await {
                        tracing::warn!(operation = label, error = %e, "capture command failed");
                        return false;
                    }
                    if let Err(e) = self.run(&["pull", remote, local_arg], CAPTURE_TIMEOUT).await {
                        tracing::warn!(operation = label, error = %e, "pull failed");
                        return false;
                    }
                    let _ = self.shell(&["rm", "-f", remote]).await;
                    match tokio::fs::metadata(local).await {
                        Ok(meta) => meta.len() > min_bytes,
                        Err(_) => false,
                    }
                }
            })
            .await
    }

    async fn settle(&self, pause: Duration) {
        tokio::time::sleep(pause).await;
    }
}

#[async_trait]
impl DeviceBridge for AdbBridge {
    async fn capture_screenshot(&self, path: &Path) -> bool {
        self.capture_file(
            "screenshot",
            &["shell", "screencap", "-p", REMOTE_SCREENSHOT],
            REMOTE_SCREENSHOT,
            path,
            MIN_SCREENSHOT_BYTES,
        )
        .await
    }

    async fn capture_ui_snapshot(&self, path: &Path) -> bool {
        self.capture_file(
            "ui_dump",
            &["shell", "uiautomator", "dump", REMOTE_UI_DUMP],
            REMOTE_UI_DUMP,
            path,
            MIN_UI_DUMP_BYTES,
        )
        .await
    }

    async fn tap(&self, x: i32, y: i32) {
        let (xs, ys) = (x.to_string(), y.to_string());
        if let Err(e) = self.shell(&["input", "tap", &xs, &ys]).await {
            tracing::warn!(x, y, error = %e, "tap failed");
        }
        self.settle(self.settle).await;
    }

    async fn type_text(&self, text: &str) {
        let escaped = escape_for_input(text);
        if let Err(e) = self.shell(&["input", "text", &escaped]).await {
            tracing::warn!(error = %e, "text input failed");
        }
        self.settle(self.settle).await;
        if let Err(e) = self.shell(&["input", "keyevent", "KEYCODE_ENTER"]).await {
            tracing::warn!(error = %e, "enter key failed");
        }
        self.settle(self.settle).await;
    }

    async fn scroll(&self, direction: ScrollDirection) {
        let swipe = match direction {
            ScrollDirection::Up => ["500", "300", "500", "1000"],
            ScrollDirection::Down => ["500", "1000", "500", "300"],
        };
        let mut args = vec!["input", "swipe"];
        args.extend_from_slice(&swipe);
        if let Err(e) = self.shell(&args).await {
            tracing::warn!(%direction, error = %e, "swipe failed");
        }
        self.settle(self.settle).await;
    }

    async fn launch(&self, package_id: &str) -> bool {
        if let Err(e) = self.shell(&["am", "force-stop", package_id]).await {
            tracing::warn!(package = package_id, error = %e, "force-stop failed");
        }
        self.settle(self.settle).await;

        let launched = self
            .shell(&[
                "monkey",
                "-p",
                package_id,
                "-c",
                "android.intent.category.LAUNCHER",
                "1",
            ])
            .await;
        match launched {
            Ok(out) if monkey_failed(&out) => {
                tracing::warn!(package = package_id, output = %out, "launcher intent rejected");
                false
            }
            Ok(_) => {
                self.settle(self.launch_settle).await;
                tracing::info!(package = package_id, "application launched");
                true
            }
            Err(e) => {
                tracing::warn!(package = package_id, error = %e, "launch failed");
                false
            }
        }
    }
}

async fn run_command(mut cmd: Command, args: &[&str], timeout: Duration) -> PilotResult<String> {
    let rendered = args.join(" ");
    let output = tokio::time::timeout(timeout, cmd.output())
        .await
        .map_err(|_| PilotError::Device(format!("adb {rendered} timed out after {timeout:?}")))??;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(PilotError::Device(format!(
            "adb {rendered} exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

async fn discover_device(adb_path: &str, timeout: Duration) -> PilotResult<String> {
    let mut cmd = Command::new(adb_path);
    cmd.arg("devices").kill_on_drop(true);
    let out = run_command(cmd, &["devices"], timeout).await?;
    parse_device_list(&out).into_iter().next().ok_or_else(|| {
        PilotError::Device(
            "no Android devices detected; connect a device and enable USB debugging".into(),
        )
    })
}

/// Serials in state `device` from `adb devices` output.
fn parse_device_list(output: &str) -> Vec<String> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let mut cols = line.split_whitespace();
            match (cols.next(), cols.next()) {
                (Some(serial), Some("device")) => Some(serial.to_string()),
                _ => None,
            }
        })
        .collect()
}

fn monkey_failed(output: &str) -> bool {
    let lower = output.to_lowercase();
    lower.contains("no activities found") || lower.contains("monkey aborted")
}
