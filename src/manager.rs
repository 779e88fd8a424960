//! 업데이트 오케스트레이터
//!
//! 상태 파일, 릴리즈 피드, 압축 해제, 호스트 확장 로더를 조합해
//! `initialize / get_status / check / update` 를 제공한다.
//!
//! ## 업데이트 순서
//! 기존 설치 디렉터리 삭제 → 다운로드 → 압축 해제 → 확장 루트 탐색 → 호스트 로드 → 상태 저장
//!
//! 호스트가 새 빌드를 받아들인 뒤에만 `currentVersion`/`currentPath`를 갱신한다.
//! 중간에 중단되면 기록되지 않은 설치 디렉터리가 남을 수 있지만 (무해),
//! `currentPath`가 검증되지 않은 경로를 가리키는 일은 없다.
//!
//! ## 동시성
//! 내부 잠금이 없다. 상태 파일은 마지막 쓰기가 이기므로 `update()`는 한 번에 하나만
//! 실행되어야 한다. 여러 호출자가 공유한다면 `Arc<tokio::sync::Mutex<UpdateManager>>`로 감싼다.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::archive;
use crate::config::{Paths, UpdaterConfig};
use crate::error::{Result, UpdaterError};
use crate::events::UpdateEvent;
use crate::github::{AssetMatcher, LatestReleases, ReleaseFeedClient};
use crate::host::{Capability, ExtensionHandle, ExtensionLoader, FolderOpener};
use crate::state::{Channel, InstallationState, Release, ReleaseIds, StateFile};
use crate::version;

/// 현재 시각 공급자 (테스트에서 고정 시각 주입용)
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// 채널별 업데이트 가능 여부
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateAvailable {
    pub stable: bool,
    pub prerelease: bool,
}

/// UI에 전달하는 상태 뷰 (상태 레코드 + 업데이트 가능 여부)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatus {
    #[serde(flatten)]
    pub state: InstallationState,
    pub update_available: UpdateAvailable,
}

impl UpdateStatus {
    pub fn from_state(state: InstallationState) -> Self {
        let newer = |latest: Option<&Release>| match (latest, state.current_version.as_deref()) {
            (Some(release), Some(current)) => version::is_newer(&release.version, current),
            _ => false,
        };
        let update_available = UpdateAvailable {
            stable: newer(state.latest_stable.as_ref()),
            prerelease: newer(state.latest_prerelease.as_ref()),
        };
        Self {
            state,
            update_available,
        }
    }

    pub fn any_update(&self) -> bool {
        self.update_available.stable || self.update_available.prerelease
    }
}

/// uBlock 설치/업데이트 매니저
pub struct UpdateManager {
    paths: Paths,
    feed_url: String,
    check_interval: chrono::Duration,
    client: ReleaseFeedClient,
    store: StateFile,
    loader: Capability<dyn ExtensionLoader>,
    opener: Capability<dyn FolderOpener>,
    clock: Clock,
}

impl UpdateManager {
    pub fn new(
        config: &UpdaterConfig,
        loader: Capability<dyn ExtensionLoader>,
        opener: Capability<dyn FolderOpener>,
    ) -> anyhow::Result<Self> {
        let matcher = AssetMatcher::new(&config.asset_pattern)
            .map_err(|e| anyhow::anyhow!("invalid asset_pattern '{}': {}", config.asset_pattern, e))?;
        let client = ReleaseFeedClient::new(&config.user_agent, config.request_timeout(), matcher)?;
        let paths = config.paths();

        if !loader.is_available() {
            tracing::warn!("[Updater] Extension host unavailable, loads will be rejected");
        }

        Ok(Self {
            store: StateFile::with_path(&paths.state_file),
            paths,
            feed_url: config.feed_url.clone(),
            check_interval: config.check_interval(),
            client,
            loader,
            opener,
            clock: Arc::new(Utc::now),
        })
    }

    /// 작업 경로 오버라이드
    pub fn with_paths(mut self, paths: Paths) -> Self {
        self.store = StateFile::with_path(&paths.state_file);
        self.paths = paths;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    pub fn state_file(&self) -> &StateFile {
        &self.store
    }

    // ─────── 공개 동작 ────────────────────────────────────────────

    /// 현재 설치본(없으면 동봉 버전)을 호스트에 로드
    pub async fn initialize(&self) -> Result<UpdateStatus> {
        let current = self.read_state().await;

        let installed = current.current_path.clone();
        let existing = blocking(move || {
            installed
                .filter(|p| p.exists())
                .map(|p| archive::resolve_install_root(&p))
        })
        .await?;

        if let Some(resolved) = existing {
            tracing::info!(
                "[Updater] Loading installed uBlock {} from {}",
                current.current_version.as_deref().unwrap_or("?"),
                resolved.display()
            );
            self.load(&resolved).await?;
            return Ok(UpdateStatus::from_state(current));
        }

        let bundled = self.paths.bundled_path.clone();
        let resolved = blocking(move || archive::resolve_install_root(&bundled)).await?;
        tracing::info!(
            "[Updater] No usable installation, falling back to bundled uBlock {} at {}",
            self.paths.bundled_version,
            resolved.display()
        );
        self.load(&resolved).await?;

        let next = self
            .write_state(InstallationState {
                current_version: Some(self.paths.bundled_version.clone()),
                current_path: Some(resolved),
                ..current
            })
            .await?;
        Ok(UpdateStatus::from_state(next))
    }

    /// 상태 조회 (부수 효과 없음)
    pub async fn get_status(&self) -> UpdateStatus {
        UpdateStatus::from_state(self.read_state().await)
    }

    /// 릴리즈 피드를 조회하고 결과를 저장
    pub async fn check(&self) -> Result<UpdateStatus> {
        let current = self.read_state().await;
        let next = self.refresh_latest(current).await?;
        Ok(UpdateStatus::from_state(next))
    }

    /// 마지막 확인 후 설정된 주기가 지났을 때만 [`check`](Self::check)
    pub async fn check_if_due(&self) -> Result<UpdateStatus> {
        let current = self.read_state().await;
        let due = match current.last_check_at {
            Some(last) => (self.clock)() - last >= self.check_interval,
            None => true,
        };

        if due {
            self.check().await
        } else {
            tracing::debug!("[Updater] Last check at {:?}, skipping", current.last_check_at);
            Ok(UpdateStatus::from_state(current))
        }
    }

    /// 채널의 최신 릴리즈를 설치하고 현재 버전으로 지정
    pub async fn update(
        &self,
        channel: Channel,
        on_progress: Option<&(dyn Fn(f64) + Send + Sync)>,
    ) -> Result<UpdateStatus> {
        let current = self.read_state().await;
        let (release, state) = self.ensure_latest(channel, current).await?;
        let release = release.ok_or(UpdaterError::NoReleaseAvailable(channel))?;

        let install_dir = self.paths.install_dir(&release.version);
        let archive_path = self.paths.archive_path(&release.version);
        tracing::info!(
            "[Updater] Installing {} uBlock {} → {}",
            channel,
            release.version,
            install_dir.display()
        );

        remove_dir_if_exists(&install_dir).await?;
        self.client
            .download(&release.asset_url, &archive_path, on_progress)
            .await?;

        let (src, dst) = (archive_path.clone(), install_dir.clone());
        blocking(move || archive::extract_zip(&src, &dst)).await??;

        if let Err(e) = tokio::fs::remove_file(&archive_path).await {
            tracing::warn!("[Updater] Failed to remove {}: {}", archive_path.display(), e);
        }

        let resolved = blocking(move || archive::resolve_install_root(&install_dir)).await?;
        self.load(&resolved).await?;

        let next = self
            .write_state(InstallationState {
                current_version: Some(release.version.clone()),
                current_path: Some(resolved),
                ..state
            })
            .await?;

        tracing::info!("[Updater] uBlock {} is now current", release.version);
        Ok(UpdateStatus::from_state(next))
    }

    /// [`update`](Self::update)를 실행하면서 UI 이벤트를 보낸다
    ///
    /// 실패 시 원문 에러 대신 분류별 사용자 메시지를 담은 `Error` 이벤트를 보낸다.
    pub async fn update_with_events<F>(&self, channel: Channel, sink: F) -> Result<UpdateStatus>
    where
        F: Fn(UpdateEvent) + Send + Sync,
    {
        let on_progress = |progress: f64| sink(UpdateEvent::Progress { progress });

        match self.update(channel, Some(&on_progress)).await {
            Ok(status) => {
                sink(UpdateEvent::Done {
                    status: Box::new(status.clone()),
                });
                Ok(status)
            }
            Err(e) => {
                tracing::error!("[Updater] {} update failed ({}): {}", channel, e.error_code(), e);
                sink(UpdateEvent::Error {
                    message: e.user_message(),
                });
                Err(e)
            }
        }
    }

    /// 상태/다운로드 폴더를 열고 그 경로를 반환
    pub async fn open_folder(&self) -> PathBuf {
        let dir = self.paths.data_dir();
        if let Some(opener) = self.opener.get().cloned() {
            let target = dir.clone();
            match blocking(move || opener.open_path(&target)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!("[Updater] Could not open {}: {:#}", dir.display(), e),
                Err(e) => tracing::warn!("[Updater] Could not open {}: {}", dir.display(), e),
            }
        }
        dir
    }

    // ─────── 내부 ──────────────────────────────────────────────

    /// 채널 릴리즈가 이미 캐시돼 있으면 재사용, 없으면 피드 조회
    async fn ensure_latest(
        &self,
        channel: Channel,
        current: InstallationState,
    ) -> Result<(Option<Release>, InstallationState)> {
        if let Some(release) = current.latest(channel) {
            tracing::debug!("[Updater] Using cached {} release {}", channel, release.version);
            return Ok((Some(release.clone()), current));
        }

        let next = self.refresh_latest(current).await?;
        Ok((next.latest(channel).cloned(), next))
    }

    async fn refresh_latest(&self, current: InstallationState) -> Result<InstallationState> {
        let LatestReleases {
            latest_stable,
            latest_prerelease,
        } = self.client.check_for_updates(&self.feed_url).await?;

        tracing::info!(
            "[Updater] Latest stable: {}, prerelease: {}",
            latest_stable.as_ref().map(|r| r.version.as_str()).unwrap_or("-"),
            latest_prerelease.as_ref().map(|r| r.version.as_str()).unwrap_or("-")
        );

        self.write_state(InstallationState {
            last_release_ids: ReleaseIds {
                stable: latest_stable.as_ref().and_then(|r| r.id.clone()),
                prerelease: latest_prerelease.as_ref().and_then(|r| r.id.clone()),
            },
            latest_stable,
            latest_prerelease,
            last_check_at: Some((self.clock)()),
            ..current
        })
        .await
    }

    /// 상태 파일 읽기. 작업 실패 시에도 기본 상태로 진행한다.
    async fn read_state(&self) -> InstallationState {
        let store = self.store.clone();
        match blocking(move || store.read()).await {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!("[State] {}, using defaults", e);
                InstallationState::default()
            }
        }
    }

    async fn write_state(&self, next: InstallationState) -> Result<InstallationState> {
        let store = self.store.clone();
        blocking(move || store.write(&next)).await?
    }

    async fn load(&self, path: &Path) -> Result<ExtensionHandle> {
        let loader = self.loader.get().cloned().ok_or_else(|| UpdaterError::LoaderRejected {
            path: path.to_path_buf(),
            message: "extension host unavailable".to_string(),
        })?;

        let target = path.to_path_buf();
        blocking(move || loader.load_extension(&target))
            .await?
            .map_err(|e| UpdaterError::LoaderRejected {
                path: path.to_path_buf(),
                message: format!("{:#}", e),
            })
    }
}

/// 블로킹 작업(파일 시스템, 호스트 호출)을 tokio 블로킹 풀에서 실행
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| UpdaterError::Task(e.to_string()))
}

async fn remove_dir_if_exists(dir: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {
            tracing::debug!("[Updater] Removed previous install at {}", dir.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(UpdaterError::fs("remove install directory", dir, e)),
    }
}
