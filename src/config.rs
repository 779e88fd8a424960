//! 업데이터 설정 및 경로
//!
//! `config/updater.toml`에서 설정을 로드한다. 파일이 없으면 기본값.
//!
//! ```toml
//! feed_url = "https://api.github.com/repos/gorhill/uBlock/releases?per_page=10"
//! check_interval_hours = 3
//! user_data_dir = "/home/me/.config/Navigatrum"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::github::DEFAULT_ASSET_PATTERN;

pub const DEFAULT_FEED_URL: &str = "https://api.github.com/repos/gorhill/uBlock/releases?per_page=10";
pub const BUNDLED_VERSION: &str = "1.69.0";
pub const APP_NAME: &str = "Navigatrum";

/// 사용자 데이터 디렉터리 오버라이드 환경 변수
pub const USER_DATA_ENV: &str = "NAVIGATRUM_USER_DATA";

/// 업데이터 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdaterConfig {
    /// GitHub releases API URL
    pub feed_url: String,
    /// 설치 가능한 에셋 이름 정규식 (대소문자 무시)
    pub asset_pattern: String,
    /// 앱에 동봉된 uBlock 버전
    pub bundled_version: String,
    /// 앱 설치 루트 (기본값: 실행 파일 디렉터리)
    pub app_root: Option<PathBuf>,
    /// 사용자 데이터 디렉터리 (기본값: OS별 경로)
    pub user_data_dir: Option<PathBuf>,
    /// 자동 확인 주기 (시간 단위, 1~24)
    pub check_interval_hours: u32,
    /// 요청 타임아웃. 없으면 무제한
    pub request_timeout_secs: Option<u64>,
    pub user_agent: String,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            feed_url: DEFAULT_FEED_URL.to_string(),
            asset_pattern: DEFAULT_ASSET_PATTERN.to_string(),
            bundled_version: BUNDLED_VERSION.to_string(),
            app_root: None,
            user_data_dir: None,
            check_interval_hours: 3,
            request_timeout_secs: None,
            user_agent: APP_NAME.to_string(),
        }
    }
}

impl UpdaterConfig {
    pub fn check_interval(&self) -> chrono::Duration {
        chrono::Duration::hours(self.check_interval_hours.clamp(1, 24) as i64)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("invalid updater config")
    }

    /// 설정과 환경 변수로부터 작업 경로 계산
    pub fn paths(&self) -> Paths {
        let user_data = std::env::var_os(USER_DATA_ENV)
            .map(PathBuf::from)
            .or_else(|| self.user_data_dir.clone())
            .unwrap_or_else(default_user_data_dir);
        let app_root = self.app_root.clone().unwrap_or_else(default_app_root);

        Paths::new(&user_data, &app_root, &self.bundled_version)
    }
}

/// 업데이터가 사용하는 모든 경로
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    /// `<user-data>/ublock/state.json`
    pub state_file: PathBuf,
    /// `<user-data>/ublock/downloads`
    pub downloads_dir: PathBuf,
    /// `<user-data>/extensions/ublock` (버전별 하위 디렉터리)
    pub extensions_base: PathBuf,
    /// `<app-root>/resources/ublock`
    pub bundled_root: PathBuf,
    /// `<app-root>/resources/ublock/<bundled-version>`
    pub bundled_path: PathBuf,
    pub bundled_version: String,
}

impl Paths {
    pub fn new(user_data: &Path, app_root: &Path, bundled_version: &str) -> Self {
        let ublock_data = user_data.join("ublock");
        let bundled_root = app_root.join("resources").join("ublock");
        Self {
            state_file: ublock_data.join("state.json"),
            downloads_dir: ublock_data.join("downloads"),
            extensions_base: user_data.join("extensions").join("ublock"),
            bundled_path: bundled_root.join(bundled_version),
            bundled_root,
            bundled_version: bundled_version.to_string(),
        }
    }

    /// 상태/다운로드 폴더 (open-folder 대상)
    pub fn data_dir(&self) -> PathBuf {
        self.state_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// 버전별 설치 디렉터리. 경로 구분자는 치환한다.
    pub fn install_dir(&self, version: &str) -> PathBuf {
        self.extensions_base.join(path_safe(version))
    }

    /// 버전별 다운로드 파일 경로
    pub fn archive_path(&self, version: &str) -> PathBuf {
        self.downloads_dir.join(format!("ublock-{}.zip", path_safe(version)))
    }
}

fn path_safe(version: &str) -> String {
    let cleaned: String = version
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => format!("_{}", cleaned),
        _ => cleaned,
    }
}

fn default_user_data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("APPDATA")
            .map(|appdata| PathBuf::from(appdata).join(APP_NAME))
            .unwrap_or_else(|_| PathBuf::from(".user-data"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(|home| PathBuf::from(home).join(".config").join(APP_NAME))
            .unwrap_or_else(|_| PathBuf::from(".user-data"))
    }
}

fn default_app_root() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|d| d.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// 설정 파일 경로 결정
pub fn config_file_path() -> PathBuf {
    // 1. 실행 파일 옆 config/updater.toml 또는 updater.toml
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            for candidate in [dir.join("config").join("updater.toml"), dir.join("updater.toml")] {
                if candidate.exists() {
                    return candidate;
                }
            }
        }
    }

    // 2. CWD의 config/updater.toml (없으면 생성용 기본 경로)
    PathBuf::from("config").join("updater.toml")
}

/// TOML 파일에서 설정 로드 (없으면 기본값)
pub fn load_updater_config() -> Result<UpdaterConfig> {
    let path = config_file_path();
    if !path.exists() {
        tracing::debug!("[Config] {} not found, using defaults", path.display());
        return Ok(UpdaterConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let cfg = UpdaterConfig::from_toml_str(&content)?;
    tracing::info!("[Config] Loaded {}", path.display());
    Ok(cfg)
}
