//! # Navigatrum uBlock 업데이터
//!
//! 브라우저에 동봉된 uBlock Origin 확장을 추적하고 GitHub 릴리즈를 확인해
//! 최신 stable/prerelease 빌드를 내려받아 설치한다.
//!
//! ## 구성
//! - **version.rs**: 태그 버전 비교 (`1.69.1` > `1.69.1b0`)
//! - **github.rs**: 릴리즈 피드 조회, 최신 릴리즈 선택, 에셋 다운로드
//! - **archive.rs**: zip 해제, 확장 루트 탐색
//! - **state.rs**: `state.json` 영속 상태
//! - **manager.rs**: 위 구성요소를 묶는 `UpdateManager`
//! - **host.rs**: 호스트 기능(확장 로드, 폴더 열기) 주입
//! - **events.rs**: UI IPC 채널/이벤트
//!
//! ## 디렉터리 구조
//! ```text
//! <user-data>/
//!   ublock/state.json
//!   ublock/downloads/ublock-<version>.zip
//!   extensions/ublock/<version>/...
//! <app-root>/resources/ublock/<bundled-version>/
//! ```

pub mod archive;
pub mod config;
pub mod error;
pub mod events;
pub mod github;
pub mod host;
pub mod manager;
pub mod state;
pub mod version;

#[cfg(test)]
mod tests;

// Re-exports for convenience
pub use config::{Paths, UpdaterConfig};
pub use error::UpdaterError;
pub use events::UpdateEvent;
pub use host::{Capability, ExtensionHandle, ExtensionLoader, FolderOpener};
pub use manager::{UpdateAvailable, UpdateManager, UpdateStatus};
pub use state::{Channel, InstallationState, Release, StateFile};
