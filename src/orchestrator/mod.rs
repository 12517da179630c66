//! 编排层（Orchestration Layer）
//!
//! ## 模块划分
//!
//! ### `app` - 应用入口
//! - 启动前的准备：会话检查、等待开课、查找课堂、签到
//! - 组装各层依赖（客户端、题库、调度器、长连接）
//!
//! ### `session_driver` - 会话驱动器
//! - 在独立任务中运行事件流程
//! - 轮询结束时间，到点中止
//!
//! ## 层次关系
//!
//! ```text
//! app (一次启动)
//!     ↓
//! session_driver (一节课)
//!     ↓
//! workflow::EventFlow (逐条事件)
//!     ↓
//! services (能力层：题库 / 入库 / 答题调度)
//!     ↓
//! infrastructure (基础设施：长连接)
//! ```

pub mod app;
pub mod session_driver;

pub use app::App;
pub use session_driver::{SessionDriver, SessionOutcome};
