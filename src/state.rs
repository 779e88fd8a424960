//! 설치/릴리즈 확인 상태 저장소 (`state.json`)
//!
//! 파일 하나에 [`InstallationState`] 레코드 하나를 저장한다.
//! 로드 시 항상 기본값 위에 병합되므로 일부 필드가 빠진 파일이나
//! 이전 스키마 파일도 누락 필드 없이 읽힌다.
//!
//! 동시 쓰기는 조율하지 않는다 (마지막 쓰기가 이김).
//! 업데이트는 한 번에 하나만 실행되어야 한다.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, UpdaterError};

/// 업데이트 채널
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    #[default]
    Stable,
    Prerelease,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Stable => write!(f, "stable"),
            Channel::Prerelease => write!(f, "prerelease"),
        }
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stable" => Ok(Channel::Stable),
            "prerelease" | "beta" => Ok(Channel::Prerelease),
            other => Err(format!("unknown channel '{}' (expected stable or prerelease)", other)),
        }
    }
}

/// 업스트림 릴리즈 식별자 (GitHub는 숫자, 다른 피드는 문자열일 수 있음)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum ReleaseId {
    Number(u64),
    Text(String),
}

/// 설치 가능한 에셋을 가진 릴리즈 하나
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Release {
    pub version: String,
    #[serde(default)]
    pub asset_url: String,
    #[serde(default)]
    pub id: Option<ReleaseId>,
}

/// 마지막으로 확인한 릴리즈 id (변경 감지용)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReleaseIds {
    pub stable: Option<ReleaseId>,
    pub prerelease: Option<ReleaseId>,
}

/// 영속 상태 레코드
///
/// `#[serde(default)]` 덕분에 파일에 없는 키는 기본값으로 채워진다.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct InstallationState {
    pub current_version: Option<String>,
    pub current_path: Option<PathBuf>,
    pub last_check_at: Option<DateTime<Utc>>,
    pub latest_stable: Option<Release>,
    pub latest_prerelease: Option<Release>,
    pub last_release_ids: ReleaseIds,
}

impl InstallationState {
    /// 채널에 해당하는 캐시된 최신 릴리즈
    pub fn latest(&self, channel: Channel) -> Option<&Release> {
        match channel {
            Channel::Stable => self.latest_stable.as_ref(),
            Channel::Prerelease => self.latest_prerelease.as_ref(),
        }
    }
}

/// [`StateFile::load`] 실패 사유
#[derive(thiserror::Error, Debug)]
pub enum StateLoadError {
    #[error("state file not found")]
    NotFound,
    #[error("state file is corrupt: {0}")]
    Corrupt(String),
}

/// 상태 파일 관리
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 상태 로드. 파일 없음과 손상을 구분한다.
    pub fn load(&self) -> std::result::Result<InstallationState, StateLoadError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StateLoadError::NotFound);
            }
            Err(e) => return Err(StateLoadError::Corrupt(e.to_string())),
        };

        serde_json::from_str(&content).map_err(|e| StateLoadError::Corrupt(e.to_string()))
    }

    /// 상태 로드. 실패하지 않는다 — 파일이 없거나 손상됐으면 기본값.
    ///
    /// 손상된 파일은 첫 실행과 같은 결과가 되지만 경고 로그를 남긴다.
    pub fn read(&self) -> InstallationState {
        match self.load() {
            Ok(state) => state,
            Err(StateLoadError::NotFound) => InstallationState::default(),
            Err(StateLoadError::Corrupt(reason)) => {
                tracing::warn!(
                    "[State] {} is unreadable, starting from defaults: {}",
                    self.path.display(),
                    reason
                );
                InstallationState::default()
            }
        }
    }

    /// 상태 저장 후 실제로 기록된 레코드를 반환
    ///
    /// 임시 파일에 먼저 쓰고 rename 하므로 중간에 중단돼도 기존 파일은 온전하다.
    pub fn write(&self, next: &InstallationState) -> Result<InstallationState> {
        let to_err = |source| UpdaterError::StateWrite {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(to_err)?;
        }

        let json = serde_json::to_string_pretty(next)
            .map_err(|e| to_err(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;

        let tmp = self.tmp_path();
        std::fs::write(&tmp, json).map_err(to_err)?;
        std::fs::rename(&tmp, &self.path).map_err(to_err)?;

        tracing::debug!("[State] Saved {}", self.path.display());
        Ok(next.clone())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "state.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
