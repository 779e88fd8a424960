//! Navigatrum uBlock 업데이터 CLI
//!
//! ## 사용법
//! ```text
//! navigatrum-ublock initialize                 # 설치본(없으면 동봉 버전) 로드 후 주기 확인
//! navigatrum-ublock status [--json]            # 상태 표시
//! navigatrum-ublock check [--json]             # 릴리즈 피드 확인
//! navigatrum-ublock update [stable|prerelease] # 채널 최신 릴리즈 설치
//! navigatrum-ublock open-folder                # 상태/다운로드 폴더 열기
//! navigatrum-ublock fetch-bundled [version]    # 동봉용 uBlock 빌드 내려받기
//! navigatrum-ublock help
//! ```
//!
//! ## 종료 코드 (check)
//! - `0` — 업데이트 있음
//! - `1` — 에러
//! - `2` — 업데이트 없음 (최신 상태)

use std::io::Write;
use std::sync::Arc;

use navigatrum_ublock::archive;
use navigatrum_ublock::config::{load_updater_config, UpdaterConfig};
use navigatrum_ublock::github::{AssetMatcher, ReleaseFeedClient};
use navigatrum_ublock::host::{ManifestLoader, SystemFolderOpener};
use navigatrum_ublock::{
    Capability, Channel, ExtensionLoader, FolderOpener, UpdateEvent, UpdateManager, UpdateStatus,
};

fn main() {
    // stdout은 JSON 출력용이므로 로그는 stderr로
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("✗ Error: failed to create tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    let code = rt.block_on(async move {
        match run(args).await {
            Ok(code) => code,
            Err(e) => {
                eprintln!("✗ Error: {:#}", e);
                1
            }
        }
    });
    std::process::exit(code);
}

async fn run(args: Vec<String>) -> anyhow::Result<i32> {
    let args_ref: Vec<&str> = args.iter().map(|s| s.as_str()).collect();

    if args_ref.is_empty() || matches!(args_ref[0], "help" | "--help" | "-h") {
        print_help();
        return Ok(0);
    }

    if matches!(args_ref[0], "--version" | "-V") {
        println!("navigatrum-ublock {}", env!("CARGO_PKG_VERSION"));
        return Ok(0);
    }

    let cfg = load_updater_config()?;

    match args_ref[0] {
        "initialize" => cmd_initialize(&build_manager(&cfg)?).await,
        "status" => cmd_status(&build_manager(&cfg)?, &args_ref[1..]).await,
        "check" => cmd_check(&build_manager(&cfg)?, &args_ref[1..]).await,
        "update" => cmd_update(&build_manager(&cfg)?, &args_ref[1..]).await,
        "open-folder" => cmd_open_folder(&build_manager(&cfg)?).await,
        "fetch-bundled" => cmd_fetch_bundled(&cfg, &args_ref[1..]).await,
        other => {
            eprintln!("✗ Unknown command: {}", other);
            eprintln!("  Run 'navigatrum-ublock help' for usage.");
            Ok(1)
        }
    }
}

fn build_manager(cfg: &UpdaterConfig) -> anyhow::Result<UpdateManager> {
    let loader: Arc<dyn ExtensionLoader> = Arc::new(ManifestLoader);
    let opener: Arc<dyn FolderOpener> = Arc::new(SystemFolderOpener);
    UpdateManager::new(cfg, Capability::available(loader), Capability::available(opener))
}

// ═══════════════════════════════════════════════════════
// 명령어 핸들러
// ═══════════════════════════════════════════════════════

async fn cmd_initialize(manager: &UpdateManager) -> anyhow::Result<i32> {
    let status = manager.initialize().await?;
    println!(
        "✓ Loaded uBlock {} from {}",
        status.state.current_version.as_deref().unwrap_or("?"),
        status
            .state
            .current_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default()
    );

    // 확인 실패는 시작을 막지 않음
    match manager.check_if_due().await {
        Ok(status) => print_availability(&status),
        Err(e) => tracing::warn!("[Updater] Background check failed: {}", e),
    }
    Ok(0)
}

async fn cmd_status(manager: &UpdateManager, flags: &[&str]) -> anyhow::Result<i32> {
    let status = manager.get_status().await;

    if flags.contains(&"--json") {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(0);
    }

    let state = &status.state;
    println!("uBlock Origin");
    println!("  Current:    {}", state.current_version.as_deref().unwrap_or("(none)"));
    if let Some(path) = &state.current_path {
        println!("  Path:       {}", path.display());
    }
    println!(
        "  Stable:     {}",
        state.latest_stable.as_ref().map(|r| r.version.as_str()).unwrap_or("-")
    );
    println!(
        "  Prerelease: {}",
        state.latest_prerelease.as_ref().map(|r| r.version.as_str()).unwrap_or("-")
    );
    println!(
        "  Checked:    {}",
        state
            .last_check_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "never".to_string())
    );
    print_availability(&status);
    Ok(0)
}

async fn cmd_check(manager: &UpdateManager, flags: &[&str]) -> anyhow::Result<i32> {
    let json_mode = flags.contains(&"--json");

    let status = match manager.check().await {
        Ok(status) => status,
        Err(e) if json_mode => {
            println!(
                "{}",
                serde_json::json!({ "ok": false, "code": e.error_code(), "error": e.to_string() })
            );
            return Ok(1);
        }
        Err(e) => {
            eprintln!("✗ {}", e.user_message());
            return Ok(1);
        }
    };

    if json_mode {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print_availability(&status);
    }

    Ok(if status.any_update() { 0 } else { 2 })
}

async fn cmd_update(manager: &UpdateManager, args: &[&str]) -> anyhow::Result<i32> {
    let channel: Channel = match args.first() {
        Some(raw) => raw.parse::<Channel>().map_err(|e| anyhow::anyhow!(e))?,
        None => Channel::Stable,
    };

    let result = manager
        .update_with_events(channel, |event| match event {
            UpdateEvent::Progress { progress } => {
                eprint!("\r  Downloading... {:>3.0}%", progress * 100.0);
                let _ = std::io::stderr().flush();
            }
            UpdateEvent::Done { .. } => eprintln!(),
            // 진행률 줄 초기화
            UpdateEvent::Error { .. } => eprint!("\r{:40}\r", ""),
        })
        .await;

    match result {
        Ok(status) => {
            println!(
                "✓ uBlock {} installed",
                status.state.current_version.as_deref().unwrap_or("?")
            );
            Ok(0)
        }
        Err(e) => {
            eprintln!("✗ {}", e.user_message());
            Ok(1)
        }
    }
}

async fn cmd_open_folder(manager: &UpdateManager) -> anyhow::Result<i32> {
    let dir = manager.open_folder().await;
    println!("{}", dir.display());
    Ok(0)
}

/// 빌드 전 동봉 리소스 준비: `<app-root>/resources/ublock/<version>/`
async fn cmd_fetch_bundled(cfg: &UpdaterConfig, args: &[&str]) -> anyhow::Result<i32> {
    let version = args
        .first()
        .map(|v| v.to_string())
        .unwrap_or_else(|| cfg.bundled_version.clone());
    let paths = cfg.paths();
    let target = paths.bundled_root.join(&version);
    let zip_path = paths.bundled_root.join(format!("uBlock0_{}.chromium.zip", version));
    let url = format!(
        "https://github.com/gorhill/uBlock/releases/download/{v}/uBlock0_{v}.chromium.zip",
        v = version
    );

    let client = ReleaseFeedClient::new(&cfg.user_agent, cfg.request_timeout(), AssetMatcher::default())?;
    tracing::info!("[Updater] Fetching bundled uBlock {} from {}", version, url);
    client.download(&url, &zip_path, None).await?;

    archive::replace_from_archive(&zip_path, &target).await?;

    println!("✓ Bundled uBlock {} → {}", version, target.display());
    Ok(0)
}

// ═══════════════════════════════════════════════════════
// 출력
// ═══════════════════════════════════════════════════════

fn print_availability(status: &UpdateStatus) {
    let available = status.update_available;
    if !status.any_update() {
        println!("✓ uBlock is up to date");
        return;
    }
    if available.stable {
        if let Some(r) = &status.state.latest_stable {
            println!("⬆ Stable update available: {}", r.version);
        }
    }
    if available.prerelease {
        if let Some(r) = &status.state.latest_prerelease {
            println!("⬆ Prerelease update available: {}", r.version);
        }
    }
}

fn print_help() {
    println!(
        "navigatrum-ublock {}

USAGE:
    navigatrum-ublock <command> [options]

COMMANDS:
    initialize                   Load the installed (or bundled) uBlock, then check if due
    status [--json]              Show installation state
    check [--json]               Query the release feed (exit 0 = update, 2 = up to date)
    update [stable|prerelease]   Install the latest release of a channel
    open-folder                  Open the uBlock data folder
    fetch-bundled [version]      Download the build shipped under resources/ublock
    help                         Show this message

ENVIRONMENT:
    NAVIGATRUM_USER_DATA         Override the user data directory
    RUST_LOG                     Log filter (default: info)",
        env!("CARGO_PKG_VERSION")
    );
}
