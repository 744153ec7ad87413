//! Host-page messaging glue.
//!
//! The browser runs inside an iframe of a larger web application. UI actions
//! that must land in the host page (switch a tab, hand an image to another
//! feature) travel over a broadcast channel as fire-and-forget messages; the
//! only "response" mechanism is a separate readiness poll the host exposes.

use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::poll::poll_until;

/// Host feature tabs an image can be handed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostTab {
    Txt2img,
    Img2img,
    Inpaint,
    Extras,
}

impl HostTab {
    pub fn as_str(&self) -> &'static str {
        match self {
            HostTab::Txt2img => "txt2img",
            HostTab::Img2img => "img2img",
            HostTab::Inpaint => "inpaint",
            HostTab::Extras => "extras",
        }
    }
}

/// Messages posted to the host page. Tagged so the host can dispatch without
/// trusting the rest of the payload first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HostMessage {
    /// Click a hidden trigger button in the host DOM.
    ClickHiddenButton { btn_ele_id: String },
    /// Activate a host tab.
    SwitchTab { tab: HostTab },
    /// Point the host's shared image slot at a file.
    SetActiveImage { path: String },
}

/// Fire-and-forget channel into the host page.
pub trait HostChannel: Send + Sync {
    fn post(&self, message: HostMessage);

    /// Whether generation info for the last [`HostMessage::SetActiveImage`]
    /// has been extracted host-side.
    fn gen_info_ready(&self) -> impl std::future::Future<Output = bool> + Send;
}

/// Wait for the host to finish extracting generation info.
pub async fn gen_info_completed<H: HostChannel>(host: &H) -> Result<()> {
    poll_until(Duration::from_millis(100), Duration::from_secs(5), || {
        host.gen_info_ready()
    })
    .await
}

/// In-process channel recording posted messages; stands in for the real
/// broadcast channel in the CLI and tests.
#[derive(Debug, Default)]
pub struct RecordingHostChannel {
    posted: Mutex<Vec<HostMessage>>,
}

impl RecordingHostChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take_posted(&self) -> Vec<HostMessage> {
        std::mem::take(&mut self.posted.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

impl HostChannel for RecordingHostChannel {
    fn post(&self, message: HostMessage) {
        self.posted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(message);
    }

    async fn gen_info_ready(&self) -> bool {
        // nothing to extract locally
        true
    }
}
