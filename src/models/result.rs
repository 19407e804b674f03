// src/models/result.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

/// A record of `results.json`: one finished quiz.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResult {
    /// `result_<uuid>`.
    pub id: String,
    pub username: String,
    pub subject: String,
    /// Number of correct answers.
    pub score: u32,
    pub total_questions: u32,
    /// 0..=100.
    pub percentage: u32,
    pub date: chrono::DateTime<chrono::Utc>,
    /// Recorded as sent by the client.
    pub answers: Vec<serde_json::Value>,
}

/// DTO for submitting a quiz attempt. The username comes from the token.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = validate_score))]
pub struct SubmitResultRequest {
    #[validate(length(min = 1, max = 50, message = "Subject is required."))]
    pub subject: String,
    pub score: u32,
    #[validate(range(min = 1, message = "totalQuestions must be positive."))]
    pub total_questions: u32,
    #[validate(range(max = 100))]
    pub percentage: Option<u32>,
    pub answers: Vec<serde_json::Value>,
}

fn validate_score(req: &SubmitResultRequest) -> Result<(), validator::ValidationError> {
    if req.score > req.total_questions {
        return Err(validator::ValidationError::new("score_exceeds_total"));
    }
    Ok(())
}

impl SubmitResultRequest {
    /// The supplied percentage, or the rounded share of correct answers.
    pub fn percentage(&self) -> u32 {
        self.percentage
            .unwrap_or_else(|| percentage_of(self.score, self.total_questions))
    }
}

pub fn percentage_of(score: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    ((score as f64 / total as f64) * 100.0).round() as u32
}

/// Admin dashboard aggregate over all results.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub total_assessments: usize,
    pub unique_users: usize,
    pub avg_score: u32,
    pub total_users: usize,
    pub subject_breakdown: Vec<SubjectStats>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubjectStats {
    pub subject: String,
    pub count: usize,
    pub avg_score: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(score: u32, total: u32, percentage: Option<u32>) -> SubmitResultRequest {
        SubmitResultRequest {
            subject: "Python".to_string(),
            score,
            total_questions: total,
            percentage,
            answers: vec![],
        }
    }

    #[test]
    fn percentage_defaults_to_rounded_share() {
        assert_eq!(request(7, 10, None).percentage(), 70);
        assert_eq!(request(2, 3, None).percentage(), 67);
        assert_eq!(request(0, 10, None).percentage(), 0);
    }

    #[test]
    fn explicit_percentage_wins() {
        assert_eq!(request(7, 10, Some(71)).percentage(), 71);
    }

    #[test]
    fn score_above_total_is_rejected() {
        assert!(request(11, 10, None).validate().is_err());
        assert!(request(10, 10, None).validate().is_ok());
    }

    #[test]
    fn zero_total_is_rejected() {
        assert!(request(0, 0, None).validate().is_err());
    }
}
