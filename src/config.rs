use std::path::Path;

use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{AppResult, ConfigError, FileError};

/// 配置文件中时间字段的格式
pub const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// 课表时间统一按北京时间（UTC+8）解析
const CST_OFFSET_SECS: i32 = 8 * 3600;

const CONFIG_HEADER: &str = "\
# 参数说明
# session_id: 网页版登录后 cookie 中的 sessionid
# course_id: 课程 ID，启动后会把账号下所有课程写入 course_list_file
# start_time / end_time: 监听时间段，格式 2024-09-01T08:00（北京时间）
# problem_delay_min / problem_delay_max: 答题随机延时范围，单位为秒
# teacher_answer_lookup: 课件里没有答案时，是否用教师身份开一节采样课查询答案
# answer_course_name: 用于采样授课的课程名（留空则取第一门自己管理的课程）
";

/// 程序配置文件
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 登录凭证（cookie: sessionid）
    pub session_id: String,
    /// 课程 ID
    pub course_id: String,
    /// 开始时间
    pub start_time: String,
    /// 结束时间
    pub end_time: String,
    /// 答题最小延时（秒）
    pub problem_delay_min: u64,
    /// 答题最大延时（秒）
    pub problem_delay_max: u64,
    // --- 平台地址 ---
    pub api_base_url: String,
    pub ws_url: String,
    // --- 本地文件 ---
    /// 题库文件
    pub bank_file: String,
    /// 课件快照目录
    pub ppt_folder: String,
    /// 手工答案文件
    pub answer_book_file: String,
    /// 课程列表输出文件
    pub course_list_file: String,
    /// 输出日志文件
    pub output_log_file: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    // --- 时间参数 ---
    /// 建立 / 重建长连接的超时（秒）
    pub connect_timeout_secs: u64,
    /// 检查结束时间的间隔（秒）
    pub end_poll_interval_secs: u64,
    /// 查找正在上课的课堂的重试间隔（秒）
    pub lesson_poll_interval_secs: u64,
    // --- 答案来源 ---
    /// 是否启用教师身份查询答案
    pub teacher_answer_lookup: bool,
    /// 采样授课使用的课程名
    pub answer_course_name: String,
    /// 本次是否新生成了默认配置文件
    #[serde(skip)]
    pub created_default: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            session_id: String::new(),
            course_id: String::new(),
            start_time: "2024-09-01T08:00".to_string(),
            end_time: "2024-09-01T09:40".to_string(),
            problem_delay_min: 10,
            problem_delay_max: 15,
            api_base_url: "https://www.yuketang.cn".to_string(),
            ws_url: "wss://www.yuketang.cn/wsapp/".to_string(),
            bank_file: "bank.json".to_string(),
            ppt_folder: "ppts".to_string(),
            answer_book_file: "answers.toml".to_string(),
            course_list_file: "courseId.txt".to_string(),
            output_log_file: "log.txt".to_string(),
            verbose_logging: false,
            connect_timeout_secs: 10,
            end_poll_interval_secs: 3,
            lesson_poll_interval_secs: 10,
            teacher_answer_lookup: true,
            answer_course_name: String::new(),
            created_default: false,
        }
    }
}

impl Config {
    /// 从 TOML 文件加载配置，并用环境变量覆盖
    ///
    /// 文件不存在时写入一份默认配置并直接使用默认值
    pub fn load(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        let mut config: Config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .map_err(|e| FileError::read_failed(&path_str, e))?;
            toml::from_str(&content).map_err(|source| FileError::TomlParseFailed {
                path: path_str.clone(),
                source,
            })?
        } else {
            let mut config = Self::default();
            config.write_default(path)?;
            config.created_default = true;
            config
        };
        config = config.with_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// 检查时间参数：轮询间隔和超时都不能为 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("connect_timeout_secs", self.connect_timeout_secs),
            ("end_poll_interval_secs", self.end_poll_interval_secs),
            ("lesson_poll_interval_secs", self.lesson_poll_interval_secs),
        ];
        for (field, value) in checks {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field,
                    value: value.to_string(),
                    reason: "必须大于 0",
                });
            }
        }
        Ok(())
    }

    /// 用环境变量覆盖配置项
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Ok(v) = std::env::var("YKT_SESSION_ID") {
            self.session_id = v;
        }
        if let Ok(v) = std::env::var("YKT_COURSE_ID") {
            self.course_id = v;
        }
        if let Ok(v) = std::env::var("YKT_START_TIME") {
            self.start_time = v;
        }
        if let Ok(v) = std::env::var("YKT_END_TIME") {
            self.end_time = v;
        }
        if let Some(v) = parse_env("YKT_DELAY_MIN", "u64")? {
            self.problem_delay_min = v;
        }
        if let Some(v) = parse_env("YKT_DELAY_MAX", "u64")? {
            self.problem_delay_max = v;
        }
        if let Some(v) = parse_env("VERBOSE_LOGGING", "bool")? {
            self.verbose_logging = v;
        }
        Ok(self)
    }

    /// 解析监听时间段
    pub fn window(&self) -> Result<TimeWindow, ConfigError> {
        Ok(TimeWindow {
            start: parse_cst("start_time", &self.start_time)?,
            end: parse_cst("end_time", &self.end_time)?,
        })
    }

    /// 创建课件目录和空题库文件
    pub fn ensure_files(&self) -> AppResult<()> {
        let folder = Path::new(&self.ppt_folder);
        if !folder.exists() {
            std::fs::create_dir_all(folder)
                .map_err(|e| FileError::write_failed(&self.ppt_folder, e))?;
            info!("✓ 创建课件目录: {}", self.ppt_folder);
        }

        let bank = Path::new(&self.bank_file);
        if !bank.exists() {
            std::fs::write(bank, "[]").map_err(|e| FileError::write_failed(&self.bank_file, e))?;
            info!("✓ 创建题库文件: {}", self.bank_file);
        }
        Ok(())
    }

    fn write_default(&self, path: &Path) -> AppResult<()> {
        let body = toml::to_string(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, format!("{}\n{}", CONFIG_HEADER, body))
            .map_err(|e| FileError::write_failed(path.display().to_string(), e))?;
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(
    var_name: &str,
    expected_type: &str,
) -> Result<Option<T>, ConfigError> {
    match std::env::var(var_name) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value,
                expected_type: expected_type.to_string(),
            }),
        Err(_) => Ok(None),
    }
}

fn parse_cst(field: &'static str, value: &str) -> Result<DateTime<FixedOffset>, ConfigError> {
    let naive = NaiveDateTime::parse_from_str(value, TIME_FORMAT).map_err(|source| {
        ConfigError::TimeParseFailed {
            field,
            value: value.to_string(),
            source,
        }
    })?;
    let offset = cst();
    let utc = naive - chrono::Duration::seconds(i64::from(offset.local_minus_utc()));
    Ok(offset.from_utc_datetime(&utc))
}

/// 北京时间时区
pub fn cst() -> FixedOffset {
    FixedOffset::east_opt(CST_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// 当前北京时间
pub fn now_cst() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&cst())
}

/// 当前时刻相对于监听时间段的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPosition {
    /// 尚未开始，还需等待的时长
    Before(std::time::Duration),
    /// 处于时间段内
    Within,
    /// 已超过结束时间
    After,
}

/// 监听时间段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl TimeWindow {
    pub fn position(&self, now: DateTime<FixedOffset>) -> WindowPosition {
        if now > self.end {
            WindowPosition::After
        } else if now < self.start {
            let wait = (self.start - now).to_std().unwrap_or_default();
            WindowPosition::Before(wait)
        } else {
            WindowPosition::Within
        }
    }

    pub fn is_over(&self, now: DateTime<FixedOffset>) -> bool {
        now > self.end
    }
}
