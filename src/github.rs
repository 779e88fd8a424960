//! GitHub Release 피드 클라이언트
//!
//! 릴리즈 목록을 가져와 설치 가능한 에셋이 붙은 최신 stable/prerelease를 고르고,
//! 선택된 에셋을 리다이렉트를 따라가며 파일로 스트리밍 다운로드한다.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use regex::Regex;
use reqwest::header::LOCATION;
use reqwest::Url;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;

use crate::error::{Result, UpdaterError};
use crate::state::{Release, ReleaseId};
use crate::version::{self, Version};

/// 리다이렉트 최대 홉 수
pub const MAX_REDIRECTS: usize = 5;

/// 기본 설치 에셋 패턴 (chromium용 uBlock0 zip)
pub const DEFAULT_ASSET_PATTERN: &str = r"^uBlock0_.+\.chromium\.zip$";

/// GitHub Release 응답 (필요한 필드만)
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubRelease {
    pub tag_name: String,
    #[serde(default)]
    pub id: Option<ReleaseId>,
    #[serde(default)]
    pub prerelease: bool,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub assets: Vec<GitHubAsset>,
}

/// GitHub Release Asset
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubAsset {
    pub name: String,
    pub browser_download_url: String,
}

/// 채널별 최신 릴리즈
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LatestReleases {
    pub latest_stable: Option<Release>,
    pub latest_prerelease: Option<Release>,
}

/// 설치 가능한 에셋 이름 판별기
#[derive(Debug, Clone)]
pub struct AssetMatcher {
    re: Regex,
}

impl AssetMatcher {
    /// 대소문자를 구분하지 않는 정규식 패턴으로 생성
    pub fn new(pattern: &str) -> std::result::Result<Self, regex::Error> {
        let re = regex::RegexBuilder::new(pattern).case_insensitive(true).build()?;
        Ok(Self { re })
    }

    pub fn is_match(&self, name: &str) -> bool {
        self.re.is_match(name)
    }
}

impl Default for AssetMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_ASSET_PATTERN).expect("default asset pattern is valid")
    }
}

/// 릴리즈 목록에서 채널별 최신 릴리즈를 선택
///
/// - 매칭되는 에셋이 정확히 하나인 릴리즈만 대상 (없거나 여러 개면 무시)
/// - draft 릴리즈는 제외
/// - 입력 순서는 가정하지 않음. 동일 버전이면 먼저 나온 쪽 유지
pub fn pick_latest_releases(releases: &[GitHubRelease], matcher: &AssetMatcher) -> LatestReleases {
    let mut stable: Option<(Version, Release)> = None;
    let mut prerelease: Option<(Version, Release)> = None;

    for release in releases {
        if release.draft {
            continue;
        }

        let mut matching = release.assets.iter().filter(|a| matcher.is_match(&a.name));
        let asset = match (matching.next(), matching.next()) {
            (Some(asset), None) => asset,
            _ => continue,
        };

        let version = version::normalize(&release.tag_name);
        let parsed = Version::parse(&version);
        let entry = Release {
            version,
            asset_url: asset.browser_download_url.clone(),
            id: release.id.clone(),
        };

        let slot = if release.prerelease { &mut prerelease } else { &mut stable };
        let replace = match slot {
            Some((best, _)) => parsed > *best,
            None => true,
        };
        if replace {
            *slot = Some((parsed, entry));
        }
    }

    LatestReleases {
        latest_stable: stable.map(|(_, r)| r),
        latest_prerelease: prerelease.map(|(_, r)| r),
    }
}

/// 릴리즈 피드 HTTP 클라이언트
pub struct ReleaseFeedClient {
    http: reqwest::Client,
    matcher: AssetMatcher,
}

impl ReleaseFeedClient {
    pub fn new(user_agent: &str, timeout: Option<Duration>, matcher: AssetMatcher) -> Result<Self> {
        // 리다이렉트는 download()에서 직접 홉 수를 세며 따라간다
        let mut builder = reqwest::Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::none());
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| UpdaterError::TransportError(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, matcher })
    }

    /// 릴리즈 목록 가져오기
    pub async fn list_releases(&self, feed_url: &str) -> Result<Vec<GitHubRelease>> {
        tracing::debug!("[Feed] GET {}", feed_url);

        let response = self
            .http
            .get(feed_url)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| UpdaterError::FeedUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpdaterError::FeedUnavailable(format!("HTTP {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| UpdaterError::FeedUnavailable(e.to_string()))?;

        let releases: Vec<GitHubRelease> =
            serde_json::from_str(&body).map_err(|e| UpdaterError::FeedCorrupt(e.to_string()))?;

        tracing::info!("[Feed] Fetched {} releases", releases.len());
        Ok(releases)
    }

    /// 릴리즈 목록을 가져와 채널별 최신 릴리즈 선택
    pub async fn check_for_updates(&self, feed_url: &str) -> Result<LatestReleases> {
        let releases = self.list_releases(feed_url).await?;
        Ok(pick_latest_releases(&releases, &self.matcher))
    }

    /// 에셋을 파일로 다운로드 (스트리밍)
    ///
    /// 본문은 `<dest>.part`에 먼저 기록하고 끝까지 받은 뒤에만 `dest`로 옮긴다.
    /// 실패하면 `.part` 파일은 삭제되고 `dest`는 건드리지 않는다.
    pub async fn download(
        &self,
        url: &str,
        dest: &Path,
        on_progress: Option<&(dyn Fn(f64) + Send + Sync)>,
    ) -> Result<()> {
        let response = self.follow_redirects(url).await?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| UpdaterError::fs("create download directory", parent, e))?;
        }

        let part = part_path(dest);
        match stream_to_file(response, &part, on_progress).await {
            Ok(received) => {
                tokio::fs::rename(&part, dest)
                    .await
                    .map_err(|e| UpdaterError::fs("finalize download", dest, e))?;
                tracing::info!("[Feed] Downloaded {} bytes → {}", received, dest.display());
                Ok(())
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&part).await;
                Err(e)
            }
        }
    }

    /// 리다이렉트를 최대 [`MAX_REDIRECTS`] 홉까지 따라가 최종 2xx 응답을 반환
    async fn follow_redirects(&self, url: &str) -> Result<reqwest::Response> {
        let mut current = Url::parse(url)
            .map_err(|e| UpdaterError::TransportError(format!("invalid URL '{}': {}", url, e)))?;
        let mut hops = 0;

        loop {
            let response = self
                .http
                .get(current.clone())
                .send()
                .await
                .map_err(|e| UpdaterError::from_reqwest(&e))?;
            let status = response.status();

            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| UpdaterError::RedirectMissingLocation {
                        status: status.as_u16(),
                        url: current.to_string(),
                    })?;

                if hops >= MAX_REDIRECTS {
                    return Err(UpdaterError::TooManyRedirects(MAX_REDIRECTS));
                }

                let next = current.join(location).map_err(|e| {
                    UpdaterError::TransportError(format!("invalid redirect target '{}': {}", location, e))
                })?;
                tracing::debug!("[Feed] {} redirect {} → {}", status.as_u16(), current, next);
                current = next;
                hops += 1;
                continue;
            }

            if !status.is_success() {
                return Err(UpdaterError::DownloadFailed(status.as_u16()));
            }

            return Ok(response);
        }
    }
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

/// 응답 본문을 파일로 기록하고 받은 바이트 수를 반환
async fn stream_to_file(
    response: reqwest::Response,
    path: &Path,
    on_progress: Option<&(dyn Fn(f64) + Send + Sync)>,
) -> Result<u64> {
    let total = response.content_length().filter(|len| *len > 0);
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| UpdaterError::fs("create download file", path, e))?;

    let mut received: u64 = 0;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| UpdaterError::from_reqwest(&e))?;
        file.write_all(&chunk)
            .await
            .map_err(|e| UpdaterError::fs("write download file", path, e))?;
        received += chunk.len() as u64;

        if let (Some(cb), Some(total)) = (on_progress, total) {
            cb((received as f64 / total as f64).min(1.0));
        }
    }

    file.flush()
        .await
        .map_err(|e| UpdaterError::fs("write download file", path, e))?;

    if let Some(total) = total {
        if received != total {
            return Err(UpdaterError::TransportError(format!(
                "incomplete body: received {} of {} bytes",
                received, total
            )));
        }
    }

    Ok(received)
}
