//! UI 연동용 IPC 채널 이름과 업데이트 이벤트

use serde::{Deserialize, Serialize};

use crate::manager::UpdateStatus;

/// 렌더러 ↔ 메인 프로세스 IPC 채널
pub mod channels {
    pub const STATUS: &str = "ublock:status";
    pub const CHECK: &str = "ublock:check";
    pub const UPDATE: &str = "ublock:update";
    pub const OPEN_FOLDER: &str = "ublock:open-folder";
    pub const PROGRESS: &str = "ublock:update-progress";
    pub const ERROR: &str = "ublock:update-error";
    pub const DONE: &str = "ublock:update-done";
}

/// 업데이트 진행 중 UI로 전달되는 이벤트
///
/// 한 번의 업데이트는 `Progress` 0회 이상 뒤에 `Done` 또는 `Error` 정확히 하나로 끝난다.
/// `Error`를 받으면 UI는 진행률 표시를 초기화한다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum UpdateEvent {
    Progress { progress: f64 },
    Done { status: Box<UpdateStatus> },
    Error { message: String },
}

impl UpdateEvent {
    /// 이벤트가 전달될 IPC 채널
    pub fn channel(&self) -> &'static str {
        match self {
            UpdateEvent::Progress { .. } => channels::PROGRESS,
            UpdateEvent::Done { .. } => channels::DONE,
            UpdateEvent::Error { .. } => channels::ERROR,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, UpdateEvent::Progress { .. })
    }
}
