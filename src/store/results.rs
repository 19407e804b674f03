// src/store/results.rs

use std::path::PathBuf;

use super::{JsonFile, StoreError};
use crate::models::result::QuizResult;

pub struct ResultStore {
    file: JsonFile<QuizResult>,
}

impl ResultStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            file: JsonFile::new(path),
        }
    }

    pub fn file(&self) -> &JsonFile<QuizResult> {
        &self.file
    }

    pub async fn append(&self, result: QuizResult) -> Result<(), StoreError> {
        self.file
            .update(|results| {
                results.push(result);
                Ok(())
            })
            .await
    }

    pub async fn list(&self) -> Result<Vec<QuizResult>, StoreError> {
        self.file.load().await
    }

    /// Results recorded for exactly `username`.
    pub async fn list_for_user(&self, username: &str) -> Result<Vec<QuizResult>, StoreError> {
        let results = self.file.load().await?;
        Ok(results
            .into_iter()
            .filter(|r| r.username == username)
            .collect())
    }

    /// Moves every result of `old` to `new`. Returns how many were moved.
    pub async fn rename_user(&self, old: &str, new: &str) -> Result<usize, StoreError> {
        if old == new {
            return Ok(0);
        }
        self.file
            .update(|results| {
                let mut moved = 0;
                for r in results.iter_mut().filter(|r| r.username == old) {
                    r.username = new.to_string();
                    moved += 1;
                }
                Ok(moved)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::temp_data_dir;

    fn result(username: &str, subject: &str, score: u32) -> QuizResult {
        QuizResult {
            id: format!("result_{}", uuid::Uuid::new_v4().simple()),
            username: username.to_string(),
            subject: subject.to_string(),
            score,
            total_questions: 10,
            percentage: score * 10,
            date: chrono::Utc::now(),
            answers: vec![serde_json::json!({"questionIndex": 0, "selected": 1})],
        }
    }

    #[tokio::test]
    async fn append_then_filter_by_user() {
        let dir = temp_data_dir();
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let results = ResultStore::new(dir.join("results.json"));

        results.append(result("ann", "Python", 7)).await.unwrap();
        results.append(result("ben", "C++", 5)).await.unwrap();
        results.append(result("ann", "Flutter", 9)).await.unwrap();

        assert_eq!(results.list().await.unwrap().len(), 3);

        let anns = results.list_for_user("ann").await.unwrap();
        assert_eq!(anns.len(), 2);
        assert_eq!(anns[0].subject, "Python");
        assert_eq!(anns[1].subject, "Flutter");
        assert!(results.list_for_user("Ann").await.unwrap().is_empty());

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn rename_moves_history() {
        let dir = temp_data_dir();
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let results = ResultStore::new(dir.join("results.json"));

        results.append(result("ann", "Python", 7)).await.unwrap();
        results.append(result("ben", "C++", 5)).await.unwrap();

        assert_eq!(results.rename_user("ann", "anna").await.unwrap(), 1);
        assert!(results.list_for_user("ann").await.unwrap().is_empty());
        assert_eq!(results.list_for_user("anna").await.unwrap().len(), 1);
        assert_eq!(results.list_for_user("ben").await.unwrap().len(), 1);

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn file_uses_camel_case_keys() {
        let dir = temp_data_dir();
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let results = ResultStore::new(dir.join("results.json"));

        results.append(result("ann", "Python", 7)).await.unwrap();

        let raw = tokio::fs::read_to_string(dir.join("results.json")).await.unwrap();
        assert!(raw.contains("\"totalQuestions\": 10"));
        assert!(raw.contains("\"percentage\": 70"));

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
