//! zip 압축 해제 및 확장 루트(manifest.json 위치) 탐색

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{Result, UpdaterError};

pub const MANIFEST_FILE: &str = "manifest.json";

/// zip을 대상 디렉터리에 압축 해제
///
/// 대상 디렉터리 밖으로 벗어나는 엔트리(`../`, 절대경로)는 건너뛴다.
pub fn extract_zip(archive_path: &Path, target_dir: &Path) -> Result<()> {
    let io_err = |path: &Path, source: io::Error| UpdaterError::ExtractIo {
        path: path.to_path_buf(),
        source,
    };

    fs::create_dir_all(target_dir).map_err(|e| io_err(target_dir, e))?;

    let file = fs::File::open(archive_path).map_err(|e| io_err(archive_path, e))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| zip_err(archive_path, e))?;

    let mut written = 0usize;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| zip_err(archive_path, e))?;
        let relative = match entry.enclosed_name() {
            Some(name) => name.to_path_buf(),
            None => {
                tracing::warn!("[Archive] Skipping unsafe entry '{}'", entry.name());
                continue;
            }
        };
        let out_path = target_dir.join(&relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path).map_err(|e| io_err(&out_path, e))?;
        } else {
            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
            }
            let mut outfile = fs::File::create(&out_path).map_err(|e| io_err(&out_path, e))?;
            io::copy(&mut entry, &mut outfile).map_err(|e| {
                // 손상된 deflate 스트림은 읽기 단계의 InvalidData로 올라온다
                if e.kind() == io::ErrorKind::InvalidData {
                    UpdaterError::ArchiveCorrupt {
                        path: archive_path.to_path_buf(),
                        message: e.to_string(),
                    }
                } else {
                    io_err(&out_path, e)
                }
            })?;
            written += 1;
        }
    }

    tracing::info!(
        "[Archive] Extracted {} files from {} → {}",
        written,
        archive_path.display(),
        target_dir.display()
    );
    Ok(())
}

/// 대상 디렉터리를 새로 채운다: 기존 내용 삭제 → 압축 해제 → zip 삭제
///
/// 해제는 블로킹 풀에서 실행된다. 해제에 실패하면 zip은 남겨 둔다.
pub async fn replace_from_archive(archive_path: &Path, target_dir: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(target_dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(UpdaterError::fs("clear target directory", target_dir, e)),
    }

    let (src, dst) = (archive_path.to_path_buf(), target_dir.to_path_buf());
    tokio::task::spawn_blocking(move || extract_zip(&src, &dst))
        .await
        .map_err(|e| UpdaterError::Task(e.to_string()))??;

    tokio::fs::remove_file(archive_path)
        .await
        .map_err(|e| UpdaterError::fs("remove archive", archive_path, e))
}

fn zip_err(archive_path: &Path, err: zip::result::ZipError) -> UpdaterError {
    match err {
        zip::result::ZipError::Io(source) => UpdaterError::ExtractIo {
            path: archive_path.to_path_buf(),
            source,
        },
        other => UpdaterError::ArchiveCorrupt {
            path: archive_path.to_path_buf(),
            message: other.to_string(),
        },
    }
}

/// 압축 해제된 디렉터리에서 실제 확장 루트를 찾는다
///
/// 1. `base/manifest.json`이 있으면 `base`
/// 2. 하위 디렉터리가 정확히 하나이고 그 안에 `manifest.json`이 있으면 그 디렉터리
/// 3. 그 외에는 `base` (로드 가능 여부는 보장하지 않음)
pub fn resolve_install_root(base: &Path) -> PathBuf {
    if base.join(MANIFEST_FILE).is_file() {
        return base.to_path_buf();
    }

    let entries = match fs::read_dir(base) {
        Ok(entries) => entries,
        Err(_) => return base.to_path_buf(),
    };

    let dirs: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|e| e.path())
        .collect();

    if let [only] = dirs.as_slice() {
        if only.join(MANIFEST_FILE).is_file() {
            return only.clone();
        }
    }

    base.to_path_buf()
}
