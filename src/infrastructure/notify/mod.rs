use crate::domains::sessions::entity::Session;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotifyConfig {
    pub enabled: bool,
    pub webhook: String,
    pub ntfy: String,
}

/// Fires a desktop notification and optional HTTP sinks when a session
/// starts waiting for input. Every delivery is best-effort; failures are
/// logged and never propagate into the monitor loop.
pub struct Notifier {
    cfg: NotifyConfig,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    session: &'a str,
    tool: &'a str,
    group: &'a str,
    status: &'a str,
    timestamp: String,
}

#[derive(Serialize)]
struct NtfyPayload {
    title: String,
    message: String,
    priority: i32,
    tags: Vec<&'static str>,
}

impl Notifier {
    pub fn new(cfg: NotifyConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        Self { cfg, client }
    }

    pub fn disabled() -> Self {
        Self::new(NotifyConfig::default())
    }

    pub async fn notify(&self, session: &Session) {
        if !self.cfg.enabled {
            return;
        }

        let message = format!(
            "{} ({}) is waiting for input",
            session.title,
            session.tool.as_str()
        );
        send_system_notification(&message).await;

        if !self.cfg.webhook.is_empty() {
            self.send_webhook(session).await;
        }
        if !self.cfg.ntfy.is_empty() {
            self.send_ntfy(session).await;
        }
    }

    async fn send_webhook(&self, session: &Session) {
        let payload = WebhookPayload {
            session: &session.title,
            tool: session.tool.as_str(),
            group: &session.group_path,
            status: session.status.as_str(),
            timestamp: Utc::now().to_rfc3339(),
        };
        if let Err(e) = self.client.post(&self.cfg.webhook).json(&payload).send().await {
            log::warn!("webhook notification failed: {e}");
        }
    }

    async fn send_ntfy(&self, session: &Session) {
        let payload = NtfyPayload {
            title: format!("{} is waiting", session.title),
            message: format!("{} · {}", session.tool.as_str(), session.group_path),
            priority: 4,
            tags: vec!["rotating_light"],
        };
        if let Err(e) = self.client.post(&self.cfg.ntfy).json(&payload).send().await {
            log::warn!("ntfy notification failed: {e}");
        }
    }
}

#[cfg(target_os = "macos")]
async fn send_system_notification(message: &str) {
    let script = format!(r#"display notification "{}" with title "agent-workspace""#,
        message.replace('"', "\\\""));
    let _ = tokio::process::Command::new("osascript")
        .args(["-e", &script])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
}

#[cfg(target_os = "linux")]
async fn send_system_notification(message: &str) {
    let _ = tokio::process::Command::new("notify-send")
        .args(["agent-workspace", message])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
}

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
async fn send_system_notification(message: &str) {
    log::info!("notification: {message}");
}
