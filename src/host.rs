//! 호스트(브라우저 셸) 기능 연동
//!
//! 업데이트 매니저는 호스트에게 두 가지만 요구한다:
//! - 경로에서 확장 로드 ([`ExtensionLoader`])
//! - 폴더 열기 ([`FolderOpener`])
//!
//! 호스트가 기능을 제공하지 않는 경우는 생성 시점에 [`Capability::Unavailable`]로 주입한다.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::archive::MANIFEST_FILE;

/// 호스트가 로드한 확장 정보
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtensionHandle {
    pub id: String,
    pub name: Option<String>,
    pub version: Option<String>,
}

/// 확장 로드 기능. 로드할 수 없는 경로면 반드시 에러를 반환해야 한다.
pub trait ExtensionLoader: Send + Sync {
    fn load_extension(&self, path: &Path) -> Result<ExtensionHandle>;
}

/// 폴더 열기 기능 (실패해도 호출자에게 치명적이지 않음)
pub trait FolderOpener: Send + Sync {
    fn open_path(&self, path: &Path) -> Result<()>;
}

/// 주입된 호스트 기능
pub enum Capability<T: ?Sized> {
    Available(Arc<T>),
    Unavailable,
}

impl<T: ?Sized> Capability<T> {
    pub fn available(inner: Arc<T>) -> Self {
        Capability::Available(inner)
    }

    pub fn get(&self) -> Option<&Arc<T>> {
        match self {
            Capability::Available(inner) => Some(inner),
            Capability::Unavailable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Capability::Available(_))
    }
}

impl<T: ?Sized> Clone for Capability<T> {
    fn clone(&self) -> Self {
        match self {
            Capability::Available(inner) => Capability::Available(inner.clone()),
            Capability::Unavailable => Capability::Unavailable,
        }
    }
}

/// GUI 호스트 없이 동작할 때 쓰는 로더
///
/// `manifest.json`이 있고 JSON으로 파싱되는 디렉터리만 받아들인다.
#[derive(Debug, Clone, Default)]
pub struct ManifestLoader;

#[derive(Deserialize)]
struct ManifestInfo {
    name: Option<String>,
    version: Option<String>,
}

impl ExtensionLoader for ManifestLoader {
    fn load_extension(&self, path: &Path) -> Result<ExtensionHandle> {
        let manifest_path = path.join(MANIFEST_FILE);
        let content = std::fs::read_to_string(&manifest_path)
            .with_context(|| format!("{} not found", manifest_path.display()))?;
        let info: ManifestInfo = serde_json::from_str(&content)
            .with_context(|| format!("{} is not valid JSON", manifest_path.display()))?;

        tracing::info!(
            "[Host] Loaded {} {} from {}",
            info.name.as_deref().unwrap_or("extension"),
            info.version.as_deref().unwrap_or("?"),
            path.display()
        );

        Ok(ExtensionHandle {
            id: path.to_string_lossy().to_string(),
            name: info.name,
            version: info.version,
        })
    }
}

/// OS 기본 파일 관리자로 폴더 열기
#[derive(Debug, Clone, Default)]
pub struct SystemFolderOpener;

impl FolderOpener for SystemFolderOpener {
    fn open_path(&self, path: &Path) -> Result<()> {
        #[cfg(target_os = "windows")]
        let program = "explorer";
        #[cfg(target_os = "macos")]
        let program = "open";
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        let program = "xdg-open";

        std::process::Command::new(program)
            .arg(path)
            .spawn()
            .with_context(|| format!("failed to launch {}", program))?;
        Ok(())
    }
}
