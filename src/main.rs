//! # 图片工作台 — 应用入口
//!
//! 本文件仅负责日志、配置、数据库与服务客户端的初始化，然后进入逐行命令循环。
//! 业务逻辑分布在各子模块中，详见 `lib.rs` 架构文档。

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use image_workbench::commands::{self, Command};
use image_workbench::config::{self, AppConfig};
use image_workbench::db::ImageStore;
use image_workbench::error::AppError;
use image_workbench::service::HttpTransformationService;
use image_workbench::session::EditorSession;

/// 解析 `--data-dir <path>`，缺省时使用平台数据目录。
fn data_dir_from_args() -> Result<PathBuf, AppError> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--data-dir" {
            return args
                .next()
                .map(PathBuf::from)
                .ok_or_else(|| AppError::Config("--data-dir 缺少路径参数".to_string()));
        }
        if let Some(path) = arg.strip_prefix("--data-dir=") {
            return Ok(PathBuf::from(path));
        }
    }
    config::default_data_dir()
}

fn run() -> Result<(), AppError> {
    let data_dir = data_dir_from_args()?;
    log::info!("setup: 数据目录 {}", data_dir.display());

    let config = AppConfig::load(&data_dir);
    config.validate()?;
    if let Err(err) = config.save(&data_dir) {
        log::warn!("setup: 写回配置文件失败: {err}");
    }

    let store = ImageStore::open(&config.resolve_db_path(&data_dir))?;
    log::info!("setup: 数据库已就绪，记录数 {}", store.count()?);

    let service = HttpTransformationService::new(&config)?;
    log::info!("setup: 外部服务 {}", config.service_base_url);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let mut session = EditorSession::init(config, store, service)?;
    println!("{}", commands::HELP);

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    for line in stdin.lock().lines() {
        let line = line?;
        let command = match Command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                println!("error: {err}");
                continue;
            }
        };
        if command == Command::Quit {
            break;
        }

        match runtime.block_on(commands::execute(&mut session, command)) {
            Ok(output) if output.is_empty() => {}
            Ok(output) => println!("{output}"),
            Err(err) => println!("error: {err}"),
        }
        stdout.flush()?;
    }

    session.teardown();
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run() {
        log::error!("启动失败: {err}");
        std::process::exit(1);
    }
}
