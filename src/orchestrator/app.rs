//! 应用入口 - 编排层
//!
//! ## 启动流程
//!
//! 1. 初始化日志、准备题库文件
//! 2. 检查 sessionId 是否有效
//! 3. 等待到开始时间（已超过结束时间则直接退出）
//! 4. 导出课程列表
//! 5. 轮询查找正在上课的课堂
//! 6. 签到，建立长连接
//! 7. 交给会话驱动器运行到下课或到点

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::clients::{AnswerBook, AnswerLookup, AnswerSources, TeacherAnswerLookup, YktClient};
use crate::config::{now_cst, Config, TimeWindow, WindowPosition};
use crate::error::ConfigError;
use crate::infrastructure::{ConnectionManager, WsTransport};
use crate::models::Session;
use crate::orchestrator::session_driver::{SessionDriver, SessionOutcome};
use crate::services::{AnswerCache, ContentIngest, DelayRange, SubmissionScheduler};
use crate::utils::logging::{self, log_startup};
use crate::workflow::EventFlow;

/// 应用主结构
pub struct App {
    config: Config,
    window: TimeWindow,
    client: YktClient,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        logging::init(&config.output_log_file).context("初始化日志失败")?;
        if config.created_default {
            info!("✓ 已生成默认配置文件，请填写 session_id 和 course_id 后重新运行");
        }
        config.ensure_files().context("准备题库文件失败")?;
        log_startup(&config);

        let window = config.window().context("监听时间段配置错误")?;
        let client = YktClient::new(&config);

        Ok(Self {
            config,
            window,
            client,
        })
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<()> {
        let valid = self
            .client
            .check_session()
            .await
            .context("检查 sessionId 失败")?;
        if !valid {
            return Err(ConfigError::SessionExpired.into());
        }
        info!("✓ sessionId 有效");

        match self.window.position(now_cst()) {
            WindowPosition::After => {
                warn!("⚠️ 当前时间已超过结束时间 {}，程序结束", self.config.end_time);
                return Ok(());
            }
            WindowPosition::Before(wait) => {
                info!(
                    "⏳ 距离开始时间 {} 还有 {} 分钟，等待中...",
                    self.config.start_time,
                    wait.as_secs() / 60
                );
                tokio::time::sleep(wait).await;
            }
            WindowPosition::Within => {}
        }

        self.export_courses().await;

        let Some(lesson_id) = self.wait_for_lesson().await else {
            warn!("⚠️ 直到结束时间都没有找到正在上课的课堂，程序结束");
            logging::log_finished("未找到课堂", &self.config.output_log_file);
            return Ok(());
        };

        let checkin = self
            .client
            .checkin(&lesson_id)
            .await
            .context("课堂签到失败")?;
        let session = Session {
            session_id: self.config.session_id.clone(),
            lesson_id,
            identity_id: checkin.identity_id,
            lesson_token: checkin.lesson_token,
            auth: checkin.auth,
        };
        info!("{} ✓ 签到成功", session);

        let outcome = self.run_session(&session).await?;
        let reason = match outcome {
            SessionOutcome::LessonFinished => "课堂已结束（下课）",
            SessionOutcome::DeadlineReached => "已到结束时间",
        };
        logging::log_finished(reason, &self.config.output_log_file);
        Ok(())
    }

    /// 建立长连接并运行到会话结束
    async fn run_session(&self, session: &Session) -> Result<SessionOutcome> {
        let client = Arc::new(self.client.clone().with_auth(session.auth.clone()));
        let cache = Arc::new(AnswerCache::new(&self.config.bank_file));
        let book = AnswerBook::load(&self.config.answer_book_file).context("加载手工答案失败")?;

        // 手工答案优先，其次以教师身份向平台查询
        let mut sources: Vec<Arc<dyn AnswerLookup>> = vec![Arc::new(book)];
        if self.config.teacher_answer_lookup {
            sources.push(Arc::new(TeacherAnswerLookup::new(
                YktClient::clone(&client),
                &self.config.answer_course_name,
            )));
        }

        let ingest = Arc::new(ContentIngest::new(
            client.clone(),
            Arc::new(AnswerSources::new(sources)),
            cache.clone(),
            &self.config.ppt_folder,
        ));
        let scheduler = SubmissionScheduler::new(
            cache,
            client,
            DelayRange::new(self.config.problem_delay_min, self.config.problem_delay_max),
        );

        let transport = Arc::new(WsTransport::new(&self.config.ws_url));
        let conn = ConnectionManager::connect(
            transport,
            session,
            Duration::from_secs(self.config.connect_timeout_secs),
        )
        .await
        .context("建立长连接失败")?;

        let flow = EventFlow::new(
            conn,
            ingest,
            scheduler,
            session.lesson_id.clone(),
            self.config.verbose_logging,
        );
        let driver = SessionDriver::new(
            flow,
            self.window.end,
            Duration::from_secs(self.config.end_poll_interval_secs),
        );

        match driver.run().await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!("{} ❌ 会话异常结束: {}", session, e);
                Err(e).context("课堂会话异常结束")
            }
        }
    }

    /// 把账号下的课程写入课程列表文件；失败不影响后续流程
    async fn export_courses(&self) {
        let courses = match self.client.list_courses().await {
            Ok(courses) => courses,
            Err(e) => {
                warn!("⚠️ 获取课程列表失败: {}", e);
                return;
            }
        };

        let content: String = courses
            .iter()
            .map(|c| format!("{}     {}\n", c.id, c.name))
            .collect();
        match tokio::fs::write(&self.config.course_list_file, content).await {
            Ok(()) => info!(
                "✓ 已导出 {} 门课程到 {}",
                courses.len(),
                self.config.course_list_file
            ),
            Err(e) => warn!(
                "⚠️ 写入课程列表失败 ({}): {}",
                self.config.course_list_file, e
            ),
        }
    }

    /// 轮询直到找到正在上课的课堂；超过结束时间返回 `None`
    async fn wait_for_lesson(&self) -> Option<String> {
        let interval = Duration::from_secs(self.config.lesson_poll_interval_secs);
        loop {
            match self.client.find_lesson_id(&self.config.course_id).await {
                Ok(Some(lesson_id)) => {
                    info!("✓ 找到正在上课的课堂: {}", lesson_id);
                    return Some(lesson_id);
                }
                Ok(None) => info!(
                    "课程 {} 还没有开始上课，{} 秒后重试",
                    self.config.course_id,
                    interval.as_secs()
                ),
                Err(e) => warn!("⚠️ 查询课堂失败: {}，{} 秒后重试", e, interval.as_secs()),
            }

            if self.window.is_over(now_cst()) {
                return None;
            }
            tokio::time::sleep(interval).await;
        }
    }
}
