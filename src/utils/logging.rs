/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Mutex;

use tracing::info;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::error::{AppResult, FileError};

/// 初始化日志：同时输出到终端和日志文件
///
/// 默认级别 info，可用 `RUST_LOG` 覆盖
pub fn init(log_file_path: &str) -> AppResult<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)
        .map_err(|e| FileError::write_failed(log_file_path, e))?;

    let log_header = format!(
        "\n{}\n课堂日志 - {}\n{}\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    file.write_all(log_header.as_bytes())
        .map_err(|e| FileError::write_failed(log_file_path, e))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::io::stdout.and(Mutex::new(file)))
        .try_init();
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 课堂自动答题模式");
    info!("📚 课程: {}", config.course_id);
    info!("🕒 时间: {} ~ {}", config.start_time, config.end_time);
    info!(
        "⏳ 答题延迟: {}~{} 秒",
        config.problem_delay_min, config.problem_delay_max
    );
    info!("📂 题库: {} | 课件目录: {}", config.bank_file, config.ppt_folder);
    info!("{}", "=".repeat(60));
}

/// 打印课堂结束信息
pub fn log_finished(reason: &str, log_file_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("🏁 {}", reason);
    info!(
        "结束时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("日志已保存至: {}", log_file_path);
}

/// 截断长文本用于日志显示，同时去掉换行
pub fn truncate_text(text: &str, max_len: usize) -> String {
    let text = text.replace('\n', " ");
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text
    }
}
