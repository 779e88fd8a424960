//! UpdateManager 시나리오 테스트 (네트워크 없이)
//!
//! 피드 서버가 필요한 흐름은 `tests/updater_integration.rs`에 있다.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};
use tempfile::TempDir;

use crate::host::{Capability, ExtensionHandle, ExtensionLoader, FolderOpener};
use crate::state::{Channel, InstallationState, Release, StateFile};
use crate::{Paths, UpdateEvent, UpdateManager, UpdaterConfig, UpdaterError};

/// 로드 요청을 기록하는 가짜 호스트
#[derive(Default)]
struct RecordingLoader {
    loaded: Mutex<Vec<PathBuf>>,
    reject: bool,
}

impl ExtensionLoader for RecordingLoader {
    fn load_extension(&self, path: &Path) -> anyhow::Result<ExtensionHandle> {
        if self.reject {
            anyhow::bail!("not a valid extension");
        }
        self.loaded.lock().unwrap().push(path.to_path_buf());
        Ok(ExtensionHandle {
            id: "ext".into(),
            ..Default::default()
        })
    }
}

#[derive(Default)]
struct RecordingOpener {
    opened: Mutex<Vec<PathBuf>>,
}

impl FolderOpener for RecordingOpener {
    fn open_path(&self, path: &Path) -> anyhow::Result<()> {
        self.opened.lock().unwrap().push(path.to_path_buf());
        anyhow::bail!("no file manager in tests")
    }
}

struct Fixture {
    _tmp: TempDir,
    paths: Paths,
    loader: Arc<RecordingLoader>,
}

impl Fixture {
    fn new() -> Self {
        Self::with_loader(RecordingLoader::default())
    }

    fn with_loader(loader: RecordingLoader) -> Self {
        let tmp = TempDir::new().unwrap();
        let paths = Paths::new(&tmp.path().join("user"), &tmp.path().join("app"), "1.69.0");
        Self {
            _tmp: tmp,
            paths,
            loader: Arc::new(loader),
        }
    }

    fn manager(&self) -> UpdateManager {
        // 연결이 거부되는 주소 → 피드 조회는 항상 FeedUnavailable
        let config = UpdaterConfig {
            feed_url: "http://127.0.0.1:1/releases".into(),
            ..Default::default()
        };
        let loader: Arc<dyn ExtensionLoader> = self.loader.clone();
        UpdateManager::new(&config, Capability::available(loader), Capability::Unavailable)
            .unwrap()
            .with_paths(self.paths.clone())
    }

    fn store(&self) -> StateFile {
        StateFile::with_path(&self.paths.state_file)
    }

    fn loaded(&self) -> Vec<PathBuf> {
        self.loader.loaded.lock().unwrap().clone()
    }
}

fn release(version: &str) -> Release {
    Release {
        version: version.into(),
        asset_url: String::new(),
        id: None,
    }
}

// ═══════════════════════════════════════════════════════
// get_status
// ═══════════════════════════════════════════════════════

#[tokio::test]
async fn status_reports_both_channels_newer() {
    let fx = Fixture::new();
    fx.store()
        .write(&InstallationState {
            current_version: Some("1.69.0".into()),
            latest_stable: Some(release("1.69.1")),
            latest_prerelease: Some(release("1.69.1b0")),
            ..Default::default()
        })
        .unwrap();

    let status = fx.manager().get_status().await;
    assert!(status.update_available.stable);
    assert!(status.update_available.prerelease);
    assert!(status.any_update());
}

#[tokio::test]
async fn status_without_current_version_has_no_updates() {
    let fx = Fixture::new();
    fx.store()
        .write(&InstallationState {
            latest_stable: Some(release("9.9.9")),
            ..Default::default()
        })
        .unwrap();

    let status = fx.manager().get_status().await;
    assert!(!status.update_available.stable);
    assert!(!status.update_available.prerelease);
}

#[tokio::test]
async fn status_same_or_older_release_is_not_an_update() {
    let fx = Fixture::new();
    fx.store()
        .write(&InstallationState {
            current_version: Some("1.69.1".into()),
            latest_stable: Some(release("v1.69.1")),
            latest_prerelease: Some(release("1.69.1b0")),
            ..Default::default()
        })
        .unwrap();

    let status = fx.manager().get_status().await;
    assert!(!status.update_available.stable);
    assert!(!status.update_available.prerelease);
}

#[tokio::test]
async fn status_serializes_flat_camel_case() {
    let fx = Fixture::new();
    let status = fx.manager().get_status().await;
    let json = serde_json::to_value(&status).unwrap();

    assert!(json.get("currentVersion").is_some());
    assert!(json.get("lastReleaseIds").is_some());
    assert_eq!(json["updateAvailable"]["stable"], serde_json::json!(false));
}

#[tokio::test]
async fn get_status_does_not_create_state_file() {
    let fx = Fixture::new();
    fx.manager().get_status().await;
    assert!(!fx.paths.state_file.exists());
}

// ═══════════════════════════════════════════════════════
// initialize
// ═══════════════════════════════════════════════════════

#[tokio::test]
async fn initialize_falls_back_to_bundled() {
    let fx = Fixture::new();

    let status = fx.manager().initialize().await.unwrap();

    assert_eq!(fx.loaded(), vec![fx.paths.bundled_path.clone()]);
    assert_eq!(status.state.current_version.as_deref(), Some("1.69.0"));
    assert_eq!(status.state.current_path.as_deref(), Some(fx.paths.bundled_path.as_path()));
    // 저장까지 되어야 함
    assert_eq!(fx.store().read().current_version.as_deref(), Some("1.69.0"));
}

#[tokio::test]
async fn initialize_resolves_nested_bundled_root() {
    let fx = Fixture::new();
    let nested = fx.paths.bundled_path.join("uBlock0.chromium");
    std::fs::create_dir_all(&nested).unwrap();
    std::fs::write(nested.join("manifest.json"), "{}").unwrap();

    let status = fx.manager().initialize().await.unwrap();

    assert_eq!(fx.loaded(), vec![nested.clone()]);
    assert_eq!(status.state.current_path, Some(nested));
}

#[tokio::test]
async fn initialize_keeps_existing_installation() {
    let fx = Fixture::new();
    let installed = fx.paths.install_dir("1.70.0");
    std::fs::create_dir_all(&installed).unwrap();
    std::fs::write(installed.join("manifest.json"), "{}").unwrap();

    let before = fx
        .store()
        .write(&InstallationState {
            current_version: Some("1.70.0".into()),
            current_path: Some(installed.clone()),
            ..Default::default()
        })
        .unwrap();

    let status = fx.manager().initialize().await.unwrap();

    assert_eq!(fx.loaded(), vec![installed]);
    assert_eq!(status.state, before);
    assert_eq!(fx.store().read(), before);
}

#[tokio::test]
async fn initialize_with_vanished_install_uses_bundled() {
    let fx = Fixture::new();
    fx.store()
        .write(&InstallationState {
            current_version: Some("1.70.0".into()),
            current_path: Some(fx.paths.install_dir("1.70.0")),
            ..Default::default()
        })
        .unwrap();

    let status = fx.manager().initialize().await.unwrap();
    assert_eq!(status.state.current_version.as_deref(), Some("1.69.0"));
    assert_eq!(fx.loaded(), vec![fx.paths.bundled_path.clone()]);
}

#[tokio::test]
async fn initialize_propagates_loader_rejection() {
    let fx = Fixture::with_loader(RecordingLoader {
        reject: true,
        ..Default::default()
    });

    let err = fx.manager().initialize().await.unwrap_err();
    assert!(matches!(err, UpdaterError::LoaderRejected { .. }), "got {:?}", err);
    // 거부된 경로는 현재 버전으로 기록되지 않음
    assert!(!fx.paths.state_file.exists());
}

#[tokio::test]
async fn initialize_without_host_is_rejected() {
    let fx = Fixture::new();
    let manager = UpdateManager::new(
        &UpdaterConfig::default(),
        Capability::Unavailable,
        Capability::Unavailable,
    )
    .unwrap()
    .with_paths(fx.paths.clone());

    let err = manager.initialize().await.unwrap_err();
    assert_eq!(err.error_code(), "LOADER_REJECTED");
    assert!(err.to_string().contains("extension host unavailable"));
}

// ═══════════════════════════════════════════════════════
// check / update (피드 없음)
// ═══════════════════════════════════════════════════════

#[tokio::test]
async fn check_with_unreachable_feed_leaves_state_untouched() {
    let fx = Fixture::new();
    let before = fx
        .store()
        .write(&InstallationState {
            current_version: Some("1.69.0".into()),
            ..Default::default()
        })
        .unwrap();

    let err = fx.manager().check().await.unwrap_err();
    assert!(matches!(err, UpdaterError::FeedUnavailable(_)), "got {:?}", err);
    assert_eq!(fx.store().read(), before);
}

#[tokio::test]
async fn check_if_due_skips_recent_check() {
    let fx = Fixture::new();
    let checked_at = Utc.with_ymd_and_hms(2026, 1, 29, 12, 0, 0).unwrap();
    fx.store()
        .write(&InstallationState {
            last_check_at: Some(checked_at),
            ..Default::default()
        })
        .unwrap();

    // 1시간 뒤 (기본 주기 3시간) → 피드를 건드리지 않음
    let manager = fx
        .manager()
        .with_clock(Arc::new(move || checked_at + chrono::Duration::hours(1)));
    let status = manager.check_if_due().await.unwrap();
    assert_eq!(status.state.last_check_at, Some(checked_at));

    // 4시간 뒤 → 피드 조회 (여기서는 도달 불가)
    let manager = fx
        .manager()
        .with_clock(Arc::new(move || checked_at + chrono::Duration::hours(4)));
    assert!(manager.check_if_due().await.is_err());
}

#[tokio::test]
async fn update_without_release_and_feed_fails() {
    let fx = Fixture::new();
    let err = fx.manager().update(Channel::Stable, None).await.unwrap_err();
    assert!(matches!(err, UpdaterError::FeedUnavailable(_)), "got {:?}", err);
    assert!(fx.loaded().is_empty());
}

#[tokio::test]
async fn update_with_events_reports_user_message() {
    let fx = Fixture::new();
    fx.store()
        .write(&InstallationState {
            current_version: Some("1.69.0".into()),
            latest_stable: Some(Release {
                version: "1.70.0".into(),
                asset_url: "http://127.0.0.1:1/asset.zip".into(),
                id: None,
            }),
            ..Default::default()
        })
        .unwrap();

    let events = Mutex::new(Vec::new());
    let result = fx
        .manager()
        .update_with_events(Channel::Stable, |e| events.lock().unwrap().push(e))
        .await;

    assert!(matches!(result, Err(UpdaterError::TransportError(_))));
    let events = events.into_inner().unwrap();
    assert_eq!(events.len(), 1);
    match &events[0] {
        UpdateEvent::Error { message } => assert!(message.contains("interrupted")),
        other => panic!("unexpected event {:?}", other),
    }
    // 현재 버전은 그대로
    assert_eq!(fx.store().read().current_version.as_deref(), Some("1.69.0"));
}

// ═══════════════════════════════════════════════════════
// open_folder
// ═══════════════════════════════════════════════════════

#[tokio::test]
async fn open_folder_returns_data_dir_even_if_opener_fails() {
    let fx = Fixture::new();
    let opener = Arc::new(RecordingOpener::default());
    let loader: Arc<dyn ExtensionLoader> = fx.loader.clone();
    let opener_cap: Arc<dyn FolderOpener> = opener.clone();
    let manager = UpdateManager::new(
        &UpdaterConfig::default(),
        Capability::available(loader),
        Capability::available(opener_cap),
    )
    .unwrap()
    .with_paths(fx.paths.clone());

    let dir = manager.open_folder().await;
    assert_eq!(dir, fx.paths.data_dir());
    assert_eq!(opener.opened.lock().unwrap().clone(), vec![dir]);
}

#[tokio::test]
async fn open_folder_without_opener_just_returns_path() {
    let fx = Fixture::new();
    assert_eq!(fx.manager().open_folder().await, fx.paths.data_dir());
}

// ═══════════════════════════════════════════════════════
// 블로킹 작업 격리
// ═══════════════════════════════════════════════════════

/// 호출된 스레드를 기록하는 호스트
#[derive(Default)]
struct ThreadRecordingHost {
    threads: Mutex<Vec<std::thread::ThreadId>>,
}

impl ExtensionLoader for ThreadRecordingHost {
    fn load_extension(&self, _path: &Path) -> anyhow::Result<ExtensionHandle> {
        self.threads.lock().unwrap().push(std::thread::current().id());
        Ok(ExtensionHandle::default())
    }
}

impl FolderOpener for ThreadRecordingHost {
    fn open_path(&self, _path: &Path) -> anyhow::Result<()> {
        self.threads.lock().unwrap().push(std::thread::current().id());
        Ok(())
    }
}

#[tokio::test]
async fn host_calls_run_on_blocking_pool() {
    let fx = Fixture::new();
    let host = Arc::new(ThreadRecordingHost::default());
    let loader: Arc<dyn ExtensionLoader> = host.clone();
    let opener: Arc<dyn FolderOpener> = host.clone();
    let manager = UpdateManager::new(
        &UpdaterConfig::default(),
        Capability::available(loader),
        Capability::available(opener),
    )
    .unwrap()
    .with_paths(fx.paths.clone());

    manager.initialize().await.unwrap();
    manager.open_folder().await;

    // current_thread 런타임에서는 테스트 스레드가 곧 런타임 스레드
    let runtime_thread = std::thread::current().id();
    let threads = host.threads.lock().unwrap().clone();
    assert_eq!(threads.len(), 2);
    assert!(threads.iter().all(|id| *id != runtime_thread));
}
