//! 업데이터 에러 타입
//!
//! ## 분류
//! - 릴리즈 피드: `FeedUnavailable`, `FeedCorrupt`, `NoReleaseAvailable`
//! - 다운로드: `TooManyRedirects`, `RedirectMissingLocation`, `DownloadFailed`, `TransportError`
//! - 압축 해제: `ArchiveCorrupt`, `ExtractIo`
//! - 확장 로드: `LoaderRejected`
//! - 상태 파일: `StateWrite`
//!
//! 어떤 에러도 자동 재시도하지 않는다. 재시도 여부는 호출자가 결정한다.

use std::path::PathBuf;

use crate::state::Channel;

pub type Result<T> = std::result::Result<T, UpdaterError>;

#[derive(thiserror::Error, Debug)]
pub enum UpdaterError {
    #[error("Release feed unavailable: {0}")]
    FeedUnavailable(String),

    #[error("Release feed returned malformed data: {0}")]
    FeedCorrupt(String),

    #[error("No {0} uBlock Origin release available")]
    NoReleaseAvailable(Channel),

    #[error("Too many redirects (limit: {0})")]
    TooManyRedirects(usize),

    #[error("Redirect response ({status}) from '{url}' has no Location header")]
    RedirectMissingLocation { status: u16, url: String },

    #[error("Download failed: HTTP {0}")]
    DownloadFailed(u16),

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Archive '{}' is corrupt: {message}", .path.display())]
    ArchiveCorrupt { path: PathBuf, message: String },

    #[error("I/O error while extracting to '{}': {source}", .path.display())]
    ExtractIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Extension loader rejected '{}': {message}", .path.display())]
    LoaderRejected { path: PathBuf, message: String },

    #[error("Failed to write state file '{}': {source}", .path.display())]
    StateWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File system error during {operation} on '{}': {source}", .path.display())]
    FileSystem {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Background task failed: {0}")]
    Task(String),
}

impl UpdaterError {
    /// 머신 리더블 에러 코드
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::FeedUnavailable(_) => "FEED_UNAVAILABLE",
            Self::FeedCorrupt(_) => "FEED_CORRUPT",
            Self::NoReleaseAvailable(_) => "NO_RELEASE_AVAILABLE",
            Self::TooManyRedirects(_) => "TOO_MANY_REDIRECTS",
            Self::RedirectMissingLocation { .. } => "REDIRECT_MISSING_LOCATION",
            Self::DownloadFailed(_) => "DOWNLOAD_FAILED",
            Self::TransportError(_) => "TRANSPORT_ERROR",
            Self::ArchiveCorrupt { .. } => "ARCHIVE_CORRUPT",
            Self::ExtractIo { .. } => "EXTRACT_IO_ERROR",
            Self::LoaderRejected { .. } => "LOADER_REJECTED",
            Self::StateWrite { .. } => "STATE_WRITE_FAILED",
            Self::FileSystem { .. } => "FILE_SYSTEM_ERROR",
            Self::Task(_) => "INTERNAL_ERROR",
        }
    }

    /// 사용자에게 표시할 메시지 (UI는 원문 에러 대신 이 문구를 보여준다)
    pub fn user_message(&self) -> String {
        match self {
            Self::FeedUnavailable(_) => {
                "Could not reach the uBlock Origin release feed. Check your connection.".to_string()
            }
            Self::FeedCorrupt(_) => {
                "The release feed returned an unexpected response. Try again later.".to_string()
            }
            Self::NoReleaseAvailable(channel) => {
                format!("No {} uBlock Origin release is available.", channel)
            }
            Self::TooManyRedirects(_) | Self::RedirectMissingLocation { .. } => {
                "The download was redirected incorrectly. Try again later.".to_string()
            }
            Self::DownloadFailed(status) => {
                format!("The download failed (HTTP {}).", status)
            }
            Self::TransportError(_) => {
                "The download was interrupted. Check your connection and try again.".to_string()
            }
            Self::ArchiveCorrupt { .. } => {
                "The downloaded archive is damaged. Try updating again.".to_string()
            }
            Self::ExtractIo { .. } | Self::FileSystem { .. } => {
                "Could not write extension files. Check available disk space.".to_string()
            }
            Self::LoaderRejected { .. } => {
                "The browser rejected the new uBlock Origin build. The previous version is still active.".to_string()
            }
            Self::StateWrite { .. } => {
                "Could not save update state. Check folder permissions.".to_string()
            }
            Self::Task(_) => "An internal error occurred. Try again.".to_string(),
        }
    }

    /// reqwest 에러를 다운로드 전송 에러로 변환
    pub(crate) fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            UpdaterError::TransportError(format!("timed out: {}", err))
        } else if err.is_connect() {
            UpdaterError::TransportError(format!("connection failed: {}", err))
        } else {
            UpdaterError::TransportError(err.to_string())
        }
    }

    pub(crate) fn fs(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        UpdaterError::FileSystem {
            operation,
            path: path.into(),
            source,
        }
    }
}
