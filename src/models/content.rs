//! 课件与题目模型
//!
//! 课件快照是 `presentation/fetch` 接口的原始响应，
//! 题目以 [`Question`] 的形式写入题库文件。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::warn;

use crate::models::de;

/// 题型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum ProblemType {
    /// 单选题
    SingleChoice,
    /// 其他题型，保留平台原始编码
    Other(i64),
}

impl ProblemType {
    /// 平台题型编码
    pub fn code(self) -> i64 {
        match self {
            ProblemType::SingleChoice => 1,
            ProblemType::Other(code) => code,
        }
    }

    /// 获取标准名称
    pub fn name(self) -> &'static str {
        match self {
            ProblemType::SingleChoice => "单选题",
            ProblemType::Other(2) => "多选题",
            ProblemType::Other(3) => "投票题",
            ProblemType::Other(4) => "填空题",
            ProblemType::Other(5) => "主观题",
            ProblemType::Other(_) => "其他题型",
        }
    }
}

impl From<i64> for ProblemType {
    fn from(code: i64) -> Self {
        match code {
            1 => ProblemType::SingleChoice,
            other => ProblemType::Other(other),
        }
    }
}

impl From<ProblemType> for i64 {
    fn from(value: ProblemType) -> Self {
        value.code()
    }
}

impl std::fmt::Display for ProblemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// 题库中的一道题
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// 所属课件 ID
    #[serde(rename = "presentation_id")]
    pub content_id: String,
    #[serde(rename = "problemId")]
    pub problem_id: String,
    #[serde(rename = "problemType")]
    pub problem_type: ProblemType,
    /// 题干
    #[serde(rename = "question", default)]
    pub prompt: String,
    /// 答案（原样提交）
    #[serde(default)]
    pub answers: String,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

impl Question {
    /// 去掉换行的答案，仅用于日志
    pub fn answer_preview(&self) -> String {
        self.answers.replace('\n', "")
    }
}

/// 一份课件
#[derive(Debug, Clone, PartialEq)]
pub struct ContentUnit {
    pub content_id: String,
    pub questions: Vec<Question>,
}

impl ContentUnit {
    /// 从课件快照中提取题目
    ///
    /// 答案优先取 `answers`，其次取 `result`；都没有时留空。
    /// 单页解析失败只跳过该页，不影响其他题目
    pub fn from_snapshot(content_id: &str, raw: &str) -> Result<Self, serde_json::Error> {
        let snapshot: Snapshot = serde_json::from_str(raw)?;
        let slides = snapshot.data.map(|d| d.slides).unwrap_or_default();

        let questions = slides
            .into_iter()
            .enumerate()
            .filter_map(|(index, value)| match serde_json::from_value::<Slide>(value) {
                Ok(slide) => slide.problem,
                Err(e) => {
                    warn!("⚠️ 课件 {} 第 {} 页解析失败，已跳过: {}", content_id, index + 1, e);
                    None
                }
            })
            .filter_map(|problem| {
                let problem_id = problem.problem_id?;
                let answers = problem
                    .answers
                    .as_ref()
                    .map(answer_text)
                    .filter(|a| !a.is_empty())
                    .or_else(|| problem.result.as_ref().map(answer_text))
                    .unwrap_or_default();
                Some(Question {
                    content_id: content_id.to_string(),
                    problem_id,
                    problem_type: ProblemType::from(problem.problem_type.unwrap_or(0)),
                    prompt: problem.body,
                    answers,
                    options: problem
                        .options
                        .into_iter()
                        .map(|o| (o.key, o.value))
                        .collect(),
                })
            })
            .collect();

        Ok(Self {
            content_id: content_id.to_string(),
            questions,
        })
    }
}

/// 把答案字段转成提交用的文本：数组按顺序拼接（["A","C"] → "AC"）
fn answer_text(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => String::new(),
        JsonValue::String(s) => s.clone(),
        JsonValue::Array(items) => items
            .iter()
            .map(|item| match item {
                JsonValue::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        other => other.to_string(),
    }
}

// ========== 快照结构 ==========

#[derive(Deserialize)]
struct Snapshot {
    #[serde(default)]
    data: Option<SnapshotData>,
}

#[derive(Deserialize)]
struct SnapshotData {
    #[serde(default, deserialize_with = "de::null_as_default")]
    slides: Vec<JsonValue>,
}

#[derive(Deserialize)]
struct Slide {
    #[serde(default)]
    problem: Option<SlideProblem>,
}

#[derive(Deserialize)]
struct SlideProblem {
    #[serde(rename = "problemId", default, deserialize_with = "de::opt_id")]
    problem_id: Option<String>,
    #[serde(rename = "problemType", default)]
    problem_type: Option<i64>,
    #[serde(default, deserialize_with = "de::loose_string")]
    body: String,
    #[serde(default)]
    answers: Option<JsonValue>,
    #[serde(default)]
    result: Option<JsonValue>,
    #[serde(default, deserialize_with = "de::null_as_default")]
    options: Vec<SlideOption>,
}

#[derive(Deserialize)]
struct SlideOption {
    #[serde(default, deserialize_with = "de::loose_string")]
    key: String,
    #[serde(default, deserialize_with = "de::loose_string")]
    value: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_questions_from_snapshot() {
        let raw = json!({
            "code": 0,
            "data": {
                "slides": [
                    {"id": "s1"},
                    {"id": "s2", "problem": {
                        "problemId": "Q1",
                        "problemType": 1,
                        "body": "1+1=?",
                        "answers": ["B"],
                        "options": [{"key": "A", "value": "1"}, {"key": "B", "value": "2"}]
                    }},
                    {"id": "s3", "problem": {
                        "problemId": 42,
                        "problemType": 2,
                        "body": "选出偶数",
                        "result": ["A", "C"],
                        "options": null
                    }}
                ]
            }
        })
        .to_string();

        let unit = ContentUnit::from_snapshot("P1", &raw).unwrap();
        assert_eq!(unit.content_id, "P1");
        assert_eq!(unit.questions.len(), 2);

        let q1 = &unit.questions[0];
        assert_eq!(q1.problem_id, "Q1");
        assert_eq!(q1.problem_type, ProblemType::SingleChoice);
        assert_eq!(q1.answers, "B");
        assert_eq!(q1.options.get("B").map(String::as_str), Some("2"));
        assert_eq!(q1.content_id, "P1");

        let q2 = &unit.questions[1];
        assert_eq!(q2.problem_id, "42");
        assert_eq!(q2.problem_type, ProblemType::Other(2));
        assert_eq!(q2.answers, "AC");
        assert!(q2.options.is_empty());
    }

    #[test]
    fn test_malformed_slide_is_skipped() {
        let raw = json!({
            "data": {
                "slides": [
                    {"id": "s1", "problem": {
                        "problemId": "Q1", "problemType": 1, "body": "1+1=?",
                        "answers": ["B"], "options": [{"key": "A", "value": "1"}]
                    }},
                    {"id": "s2", "problem": {
                        "problemId": "Q2", "problemType": 1, "body": 3,
                        "answers": ["A"], "options": [{"key": "A", "value": null}]
                    }},
                    {"id": "s3", "problem": {
                        "problemId": "Q3", "problemType": 1, "body": {"text": "?"}
                    }},
                    "not a slide"
                ]
            }
        })
        .to_string();

        let unit = ContentUnit::from_snapshot("P1", &raw).unwrap();
        let ids: Vec<_> = unit.questions.iter().map(|q| q.problem_id.as_str()).collect();
        assert_eq!(ids, ["Q1", "Q2"]);

        let q2 = &unit.questions[1];
        assert_eq!(q2.prompt, "3");
        assert_eq!(q2.options.get("A").map(String::as_str), Some(""));
    }

    #[test]
    fn test_snapshot_without_problems() {
        let unit = ContentUnit::from_snapshot("P1", r#"{"data":{"slides":null}}"#).unwrap();
        assert!(unit.questions.is_empty());

        let unit = ContentUnit::from_snapshot("P1", r#"{"code":50000,"msg":"error"}"#).unwrap();
        assert!(unit.questions.is_empty());
    }

    #[test]
    fn test_bank_record_uses_platform_keys() {
        let question = Question {
            content_id: "P1".into(),
            problem_id: "Q1".into(),
            problem_type: ProblemType::SingleChoice,
            prompt: "题干".into(),
            answers: "B".into(),
            options: BTreeMap::new(),
        };
        let value = serde_json::to_value(&question).unwrap();
        assert_eq!(value["presentation_id"], "P1");
        assert_eq!(value["problemId"], "Q1");
        assert_eq!(value["problemType"], 1);
        assert_eq!(value["question"], "题干");
        assert_eq!(value["answers"], "B");

        let back: Question = serde_json::from_value(value).unwrap();
        assert_eq!(back, question);
    }

    #[test]
    fn test_answer_preview_strips_newlines() {
        let question = Question {
            content_id: "P1".into(),
            problem_id: "Q1".into(),
            problem_type: ProblemType::Other(5),
            prompt: String::new(),
            answers: "第一行\n第二行".into(),
            options: BTreeMap::new(),
        };
        assert_eq!(question.answer_preview(), "第一行第二行");
        assert_eq!(question.problem_type.name(), "主观题");
    }
}
