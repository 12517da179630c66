/// 手工答案本
///
/// 优先于教师身份查询；可以在 `answers.toml` 里按题目 ID 填写：
///
/// ```toml
/// [answers]
/// "1238019568299968515" = "B"
/// ```
use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use crate::clients::AnswerLookup;
use crate::error::{AppResult, FileError};

#[derive(Debug, Default, Deserialize)]
pub struct AnswerBook {
    #[serde(default)]
    answers: HashMap<String, String>,
}

impl AnswerBook {
    /// 加载答案本，文件不存在时返回空答案本
    pub fn load(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let path_str = path.display().to_string();
        let content =
            std::fs::read_to_string(path).map_err(|e| FileError::read_failed(&path_str, e))?;
        let book: AnswerBook =
            toml::from_str(&content).map_err(|source| FileError::TomlParseFailed {
                path: path_str.clone(),
                source,
            })?;

        info!("✓ 已加载手工答案 {} 条: {}", book.answers.len(), path_str);
        Ok(book)
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }
}

#[async_trait]
impl AnswerLookup for AnswerBook {
    async fn lookup_answer(&self, problem_id: &str) -> Option<String> {
        self.answers
            .get(problem_id)
            .filter(|a| !a.is_empty())
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_is_empty_book() {
        let dir = tempfile::tempdir().unwrap();
        let book = AnswerBook::load(dir.path().join("answers.toml")).unwrap();
        assert!(book.is_empty());
        assert_eq!(book.lookup_answer("Q1").await, None);
    }

    #[tokio::test]
    async fn test_lookup_by_problem_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("answers.toml");
        std::fs::write(
            &path,
            r#"
            [answers]
            "Q1" = "B"
            "Q2" = ""
            "#,
        )
        .unwrap();

        let book = AnswerBook::load(&path).unwrap();
        assert_eq!(book.len(), 2);
        assert_eq!(book.lookup_answer("Q1").await.as_deref(), Some("B"));
        assert_eq!(book.lookup_answer("Q2").await, None);
        assert_eq!(book.lookup_answer("Q3").await, None);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("answers.toml");
        std::fs::write(&path, "[answers\n").unwrap();
        assert!(AnswerBook::load(&path).is_err());
    }
}
