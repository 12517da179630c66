//! 课堂事件处理流程 - 流程层
//!
//! 核心职责：按到达顺序逐条处理长连接事件
//!
//! - 课件相关事件：拉取课件并写入题库（在本条事件内等待完成）
//! - 题目相关事件：交给答题调度器（派生任务，不等待）
//! - 带 `unlockedproblem` 的事件：对每个已解锁题目补交一次
//! - `lessonfinished`：进入终态

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::FatalConnectionError;
use crate::infrastructure::ConnectionManager;
use crate::models::event::{Announce, ProblemFinished, ProblemNotice};
use crate::models::{ClientMessage, ServerEvent};
use crate::services::{ContentIngest, SubmissionScheduler, SubmitMode};

/// 课堂状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    /// 正在放映的课件
    Presenting(String),
    /// 正在作答的题目
    QuestionOpen(String),
    /// 已下课
    Ended,
}

/// 处理一条事件后的走向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Ended,
}

/// 课堂事件处理流程
///
/// - 独占长连接，只有这里读取消息
/// - 不持有题库，只依赖业务能力（services）
pub struct EventFlow {
    conn: ConnectionManager,
    ingest: Arc<ContentIngest>,
    scheduler: SubmissionScheduler,
    lesson_id: String,
    state: SessionState,
    verbose_logging: bool,
}

impl EventFlow {
    pub fn new(
        conn: ConnectionManager,
        ingest: Arc<ContentIngest>,
        scheduler: SubmissionScheduler,
        lesson_id: impl Into<String>,
        verbose_logging: bool,
    ) -> Self {
        Self {
            conn,
            ingest,
            scheduler,
            lesson_id: lesson_id.into(),
            state: SessionState::Idle,
            verbose_logging,
        }
    }

    /// 读取并处理事件，直到下课或连接彻底失败
    pub async fn run(&mut self) -> Result<(), FatalConnectionError> {
        loop {
            let raw = self.conn.read_next().await?;
            if self.handle_raw(&raw).await == Flow::Ended {
                return Ok(());
            }
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// 处理一条原始消息
    pub async fn handle_raw(&mut self, raw: &str) -> Flow {
        if self.verbose_logging {
            info!("📩 收到消息: {}", raw);
        } else {
            debug!("📩 收到消息: {}", raw);
        }

        match ServerEvent::parse(raw) {
            Ok(event) => self.dispatch(event).await,
            Err(e) => {
                warn!("⚠️ 无法解析的消息 ({}): {}", e, raw);
                Flow::Continue
            }
        }
    }

    /// 按事件类型分发
    pub async fn dispatch(&mut self, event: ServerEvent) -> Flow {
        if self.state == SessionState::Ended {
            debug!("已下课，忽略事件 {}", event.kind());
            return Flow::Ended;
        }

        match event {
            ServerEvent::Hello(announce) | ServerEvent::FetchTimeline(announce) => {
                self.on_announce(&announce).await;
            }
            ServerEvent::ShowPresentation(pres) => {
                if let Some(id) = pres.presentation.as_deref() {
                    info!("🖥️ 开始放映课件 {}", id);
                    refresh(&self.ingest, id).await;
                    self.state = SessionState::Presenting(id.to_string());
                }
            }
            ServerEvent::PresentationCreated(pres) | ServerEvent::PresentationUpdated(pres) => {
                if let Some(id) = pres.presentation.as_deref() {
                    info!("🆕 课件 {} 有更新", id);
                    refresh(&self.ingest, id).await;
                }
                self.send(ClientMessage::fetch_timeline(&self.lesson_id)).await;
            }
            ServerEvent::SlideNav(nav) => {
                let slide = nav.slide.unwrap_or_default();
                if let Some(id) = slide.pres.as_deref() {
                    info!(
                        "📄 翻页: 课件 {} 幻灯片 {}",
                        id,
                        slide.sid.as_deref().unwrap_or("-")
                    );
                    refresh(&self.ingest, id).await;
                    self.state = SessionState::Presenting(id.to_string());
                }
                self.compensate(&nav.unlockedproblem);
            }
            ServerEvent::UnlockProblem(notice) => self.on_unlock(&notice).await,
            ServerEvent::ProblemInfo(detail) => {
                if let Some(id) = detail.problemid {
                    info!("📋 收到题目 {} 的详情", id);
                    self.scheduler.submit(&id, SubmitMode::Jittered);
                    self.state = SessionState::QuestionOpen(id);
                }
            }
            ServerEvent::ExtendTime(notice) => {
                let extend = notice.problem.as_ref().and_then(|p| p.extend).unwrap_or(0);
                if let Some(id) = notice.problem_id() {
                    info!("⏰ 题目 {} 延时 {} 秒，立即补交", id, extend);
                    self.scheduler.submit(id, SubmitMode::Immediate);
                }
            }
            ServerEvent::ProblemFinished(ProblemFinished { prob, pres }) => {
                info!("🔒 题目 {} 已结束作答", prob.as_deref().unwrap_or("-"));
                self.state = match pres {
                    Some(pres) => SessionState::Presenting(pres),
                    None => SessionState::Idle,
                };
            }
            ServerEvent::CallPaused(notice) => {
                info!("📢 点名: {}", notice.title().unwrap_or("-"));
            }
            ServerEvent::ShowFinished(pres) => {
                if let Some(id) = pres.presentation.as_deref() {
                    info!("🖥️ 课件 {} 放映结束", id);
                    refresh(&self.ingest, id).await;
                }
                self.state = SessionState::Idle;
            }
            ServerEvent::LessonFinished(notice) => {
                info!("🔔 下课: {}", notice.title().unwrap_or("课堂已结束"));
                self.state = SessionState::Ended;
                return Flow::Ended;
            }
            ServerEvent::Unknown => {
                info!("❓ 未识别的事件");
            }
        }

        Flow::Continue
    }

    /// 对已解锁的题目逐个补交，不判断是否答过
    pub fn compensate(&self, unlocked: &[String]) {
        if unlocked.is_empty() {
            return;
        }
        info!("🔁 补交已解锁题目 {} 道", unlocked.len());
        for id in unlocked {
            self.scheduler.submit(id, SubmitMode::Jittered);
        }
    }

    async fn on_announce(&mut self, announce: &Announce) {
        if let Some(id) = announce.content_id() {
            refresh(&self.ingest, id).await;
            self.state = SessionState::Presenting(id.to_string());
        }
        self.compensate(&announce.unlockedproblem);
    }

    async fn on_unlock(&mut self, notice: &ProblemNotice) {
        let Some(id) = notice.problem_id() else {
            warn!("⚠️ 解锁事件缺少题目 ID");
            return;
        };
        info!("🔓 题目 {} 已解锁", id);

        self.send(ClientMessage::problem_info(&self.lesson_id, id))
            .await;
        if let Some(pres) = notice.content_id() {
            refresh(&self.ingest, pres).await;
        }
        self.state = SessionState::QuestionOpen(id.to_string());
        self.scheduler.submit(id, SubmitMode::Jittered);
    }

    async fn send(&mut self, message: ClientMessage) {
        if let Err(e) = self.conn.send(&message).await {
            warn!("⚠️ 控制消息发送失败: {}", e);
        }
    }
}

/// 拉取课件并写入题库；失败只记日志
async fn refresh(ingest: &ContentIngest, content_id: &str) {
    match ingest.store(content_id).await {
        Ok(count) => info!("✓ 课件 {} 已缓存，共 {} 道题", content_id, count),
        Err(e) => warn!("⚠️ 课件 {} 缓存失败: {}", content_id, e),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::clients::{AnswerLookup, AnswerSubmission, ContentFetcher};
    use crate::error::ApiError;
    use crate::infrastructure::testing::{text, ScriptedTransport, Step};
    use crate::models::Session;
    use crate::services::scheduler::tests::RecordingSubmitter;
    use crate::services::{AnswerCache, DelayRange};
    use async_trait::async_trait;
    use std::time::{Duration, Instant};
    use tokio::sync::mpsc::UnboundedReceiver;

    /// 任何课件 ID 都返回同一份快照
    pub(crate) struct StaticFetcher(pub(crate) String);

    #[async_trait]
    impl ContentFetcher for StaticFetcher {
        async fn fetch_presentation(&self, _content_id: &str) -> Result<String, ApiError> {
            Ok(self.0.clone())
        }
    }

    struct NoAnswers;

    #[async_trait]
    impl AnswerLookup for NoAnswers {
        async fn lookup_answer(&self, _problem_id: &str) -> Option<String> {
            None
        }
    }

    pub(crate) fn snapshot(answers: &[(&str, &str)]) -> String {
        let slides: Vec<_> = answers
            .iter()
            .map(|(id, answer)| {
                serde_json::json!({
                    "problem": {"problemId": id, "problemType": 1, "body": "题干", "answers": [answer]}
                })
            })
            .collect();
        serde_json::json!({"data": {"slides": slides}}).to_string()
    }

    pub(crate) fn session() -> Session {
        Session {
            session_id: "sid".into(),
            lesson_id: "L1".into(),
            identity_id: "1001".into(),
            lesson_token: "lt".into(),
            auth: "auth".into(),
        }
    }

    pub(crate) struct Harness {
        pub(crate) flow: EventFlow,
        pub(crate) transport: Arc<ScriptedTransport>,
        pub(crate) submissions: UnboundedReceiver<(Instant, AnswerSubmission)>,
        _dir: tempfile::TempDir,
    }

    pub(crate) async fn harness(steps: Vec<Step>, delay: DelayRange, bank: &[(&str, &str)]) -> Harness {
        harness_with(vec![Some(steps)], delay, bank).await
    }

    /// 每个元素是一次连接的脚本，`None` 表示那次连接失败
    pub(crate) async fn harness_with(
        scripts: Vec<Option<Vec<Step>>>,
        delay: DelayRange,
        bank: &[(&str, &str)],
    ) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(AnswerCache::new(dir.path().join("bank.json")));
        let ingest = Arc::new(ContentIngest::new(
            Arc::new(StaticFetcher(snapshot(bank))),
            Arc::new(NoAnswers),
            cache.clone(),
            dir.path(),
        ));
        let (submitter, submissions) = RecordingSubmitter::new();
        let scheduler = SubmissionScheduler::new(cache, submitter, delay);

        let transport = ScriptedTransport::new(scripts);
        let conn = ConnectionManager::connect(transport.clone(), &session(), Duration::from_secs(1))
            .await
            .unwrap();

        Harness {
            flow: EventFlow::new(conn, ingest, scheduler, "L1", false),
            transport,
            submissions,
            _dir: dir,
        }
    }

    async fn next_submission(
        rx: &mut UnboundedReceiver<(Instant, AnswerSubmission)>,
    ) -> (Instant, AnswerSubmission) {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("等待提交超时")
            .expect("提交通道已关闭")
    }

    async fn count_submissions(rx: &mut UnboundedReceiver<(Instant, AnswerSubmission)>) -> usize {
        let mut count = 0;
        while let Ok(Some(_)) = tokio::time::timeout(Duration::from_millis(300), rx.recv()).await {
            count += 1;
        }
        count
    }

    #[tokio::test]
    async fn test_unlock_submits_cached_answer_within_delay() {
        let mut h = harness(
            vec![
                text(r#"{"op":"unlockproblem","problem":{"prob":"Q1","pres":"P1"}}"#),
                text(r#"{"op":"lessonfinished"}"#),
            ],
            DelayRange::new(0, 1),
            &[("Q1", "B")],
        )
        .await;

        let started = Instant::now();
        h.flow.run().await.unwrap();
        assert_eq!(h.flow.state(), &SessionState::Ended);

        let (at, submission) = next_submission(&mut h.submissions).await;
        assert_eq!(submission.problem_id, "Q1");
        assert_eq!(submission.result, vec!["B".to_string()]);
        assert!(at.duration_since(started) < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_unlock_requests_problem_info() {
        let mut h = harness(vec![], DelayRange::new(0, 0), &[("Q1", "B")]).await;

        h.flow
            .handle_raw(r#"{"op":"unlockproblem","problem":{"prob":"Q1","pres":"P1"}}"#)
            .await;
        assert_eq!(h.flow.state(), &SessionState::QuestionOpen("Q1".into()));

        let sent = h.transport.sent();
        let info: serde_json::Value = serde_json::from_str(&sent[1].1).unwrap();
        assert_eq!(
            info,
            serde_json::json!({"op": "probleminfo", "lessonid": "L1", "problemid": "Q1", "msgid": 1})
        );
    }

    #[tokio::test]
    async fn test_repeated_unlock_submits_each_time() {
        let mut h = harness(vec![], DelayRange::new(0, 0), &[("Q1", "B")]).await;
        h.flow.handle_raw(r#"{"op":"showpresentation","presentation":"P1"}"#).await;

        for _ in 0..2 {
            h.flow
                .handle_raw(r#"{"op":"unlockproblem","problem":{"prob":"Q1"}}"#)
                .await;
        }
        h.flow.handle_raw(r#"{"op":"probleminfo","problemid":"Q1"}"#).await;

        assert_eq!(count_submissions(&mut h.submissions).await, 3);
    }

    #[tokio::test]
    async fn test_hello_sweep_resubmits_every_unlocked_question() {
        let mut h = harness(
            vec![],
            DelayRange::new(0, 0),
            &[("Q1", "A"), ("Q2", "B"), ("Q3", "C")],
        )
        .await;

        h.flow
            .handle_raw(
                r#"{"op":"hello","presentation":"P1","timeline":[],"unlockedproblem":["Q1","Q2","Q3"]}"#,
            )
            .await;
        assert_eq!(h.flow.state(), &SessionState::Presenting("P1".into()));
        assert_eq!(count_submissions(&mut h.submissions).await, 3);

        // 重连后同样的通告再来一次，已答过的也照交
        h.flow
            .handle_raw(r#"{"op":"fetchtimeline","presentation":"P1","unlockedproblem":["Q1","Q2","Q3"]}"#)
            .await;
        assert_eq!(count_submissions(&mut h.submissions).await, 3);
    }

    #[tokio::test]
    async fn test_slide_nav_sweep() {
        let mut h = harness(vec![], DelayRange::new(0, 0), &[("Q1", "A"), ("Q2", "B")]).await;

        h.flow
            .handle_raw(r#"{"op":"slidenav","slide":{"pres":"P1","sid":"S9"},"unlockedproblem":["Q1","Q2"]}"#)
            .await;
        assert_eq!(h.flow.state(), &SessionState::Presenting("P1".into()));
        assert_eq!(count_submissions(&mut h.submissions).await, 2);
    }

    #[tokio::test]
    async fn test_presentation_updated_requests_timeline() {
        let mut h = harness(vec![], DelayRange::new(0, 0), &[]).await;

        h.flow
            .handle_raw(r#"{"op":"presentationupdated","presentation":"P1"}"#)
            .await;

        let sent = h.transport.sent();
        let ack: serde_json::Value = serde_json::from_str(&sent[1].1).unwrap();
        assert_eq!(
            ack,
            serde_json::json!({"op": "fetchtimeline", "lessonid": "L1", "msgid": 1})
        );
        assert_eq!(h.flow.state(), &SessionState::Idle);
    }

    #[tokio::test]
    async fn test_extend_time_submits_immediately() {
        let mut h = harness(vec![], DelayRange::new(30, 30), &[("Q1", "B")]).await;
        h.flow.handle_raw(r#"{"op":"showpresentation","presentation":"P1"}"#).await;

        let started = Instant::now();
        h.flow
            .handle_raw(r#"{"op":"extendtime","problem":{"prob":"Q1","extend":60}}"#)
            .await;

        let (at, submission) = next_submission(&mut h.submissions).await;
        assert_eq!(submission.problem_id, "Q1");
        assert!(at.duration_since(started) < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_problem_finished_and_show_finished_transitions() {
        let mut h = harness(vec![], DelayRange::new(0, 0), &[("Q1", "B")]).await;

        h.flow
            .handle_raw(r#"{"op":"unlockproblem","problem":{"prob":"Q1","pres":"P1"}}"#)
            .await;
        h.flow
            .handle_raw(r#"{"op":"problemfinished","prob":"Q1","pres":"P1"}"#)
            .await;
        assert_eq!(h.flow.state(), &SessionState::Presenting("P1".into()));

        h.flow.handle_raw(r#"{"op":"problemfinished","prob":"Q1"}"#).await;
        assert_eq!(h.flow.state(), &SessionState::Idle);

        h.flow.handle_raw(r#"{"op":"showpresentation","presentation":"P1"}"#).await;
        h.flow.handle_raw(r#"{"op":"showfinished","presentation":"P1"}"#).await;
        assert_eq!(h.flow.state(), &SessionState::Idle);
    }

    #[tokio::test]
    async fn test_unknown_and_garbage_are_ignored() {
        let mut h = harness(vec![], DelayRange::new(0, 0), &[]).await;

        assert_eq!(h.flow.handle_raw(r#"{"op":"danmu","text":"hi"}"#).await, Flow::Continue);
        assert_eq!(h.flow.handle_raw("not json").await, Flow::Continue);
        assert_eq!(
            h.flow
                .handle_raw(r#"{"op":"callpaused","event":{"title":"随机点名"}}"#)
                .await,
            Flow::Continue
        );
        assert_eq!(h.flow.state(), &SessionState::Idle);
    }

    #[tokio::test]
    async fn test_lesson_finished_is_terminal() {
        let mut h = harness(vec![], DelayRange::new(0, 0), &[("Q1", "B")]).await;

        assert_eq!(h.flow.handle_raw(r#"{"op":"lessonfinished"}"#).await, Flow::Ended);
        assert_eq!(
            h.flow
                .handle_raw(r#"{"op":"unlockproblem","problem":{"prob":"Q1"}}"#)
                .await,
            Flow::Ended
        );
        assert_eq!(h.flow.state(), &SessionState::Ended);
        assert_eq!(count_submissions(&mut h.submissions).await, 0);
    }

    #[tokio::test]
    async fn test_run_survives_one_reconnect() {
        let mut h = harness_with(
            vec![
                Some(vec![Step::Drop]),
                Some(vec![
                    text(r#"{"op":"hello","presentation":"P1"}"#),
                    text(r#"{"op":"lessonfinished"}"#),
                ]),
            ],
            DelayRange::new(0, 0),
            &[("Q1", "B")],
        )
        .await;

        h.flow.run().await.unwrap();
        assert_eq!(h.transport.opens(), 2);
        assert_eq!(h.flow.state(), &SessionState::Ended);
    }
}
