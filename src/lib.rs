//! # YKT Session Bot
//!
//! 课堂长连接自动应答程序：监听课堂事件，缓存课件中的题目，在题目解锁后自动提交答案
//!
//! ## 架构设计
//!
//! 本系统采用四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（长连接），只暴露能力
//! - `ConnectionManager` - 唯一的连接持有者，负责握手与一次性重连
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `AnswerCache` - 题库文件读写能力
//! - `ContentIngest` - 课件拉取与入库能力
//! - `SubmissionScheduler` - 延时答题能力
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一条事件"的处理流程
//! - `EventFlow` - 事件分发与课堂状态
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/app` - 启动流程，组装依赖
//! - `orchestrator/session_driver` - 运行一节课直到下课或到点
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::ConnectionManager;
pub use models::{ContentUnit, Question, ServerEvent, Session};
pub use orchestrator::{App, SessionDriver, SessionOutcome};
pub use workflow::{EventFlow, SessionState};
