// src/models/question.rs

use std::fmt;

use serde::{Deserialize, Serialize};

/// Marker every payload carries in `generatedBy`.
pub const GENERATED_BY: &str = "Gemini AI";

/// The closed set of subjects a skill check covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Subject {
    JavaScript,
    TypeScript,
    Python,
    #[serde(rename = "C#")]
    CSharp,
    Flutter,
    #[serde(rename = "C++")]
    Cpp,
}

impl Subject {
    pub const ALL: [Subject; 6] = [
        Subject::JavaScript,
        Subject::TypeScript,
        Subject::Python,
        Subject::CSharp,
        Subject::Flutter,
        Subject::Cpp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Subject::JavaScript => "JavaScript",
            Subject::TypeScript => "TypeScript",
            Subject::Python => "Python",
            Subject::CSharp => "C#",
            Subject::Flutter => "Flutter",
            Subject::Cpp => "C++",
        }
    }

    pub fn parse(name: &str) -> Option<Subject> {
        Subject::ALL.into_iter().find(|s| s.as_str() == name)
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn parse(value: &str) -> Option<Difficulty> {
        match value {
            "easy" => Some(Difficulty::Easy),
            "medium" => Some(Difficulty::Medium),
            "hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }
}

/// One language rendering of a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalizedQuestion {
    pub question: String,
    /// Always exactly four options.
    pub options: Vec<String>,
    pub topic: String,
}

/// A bilingual multiple-choice question.
/// `correct_answer_index` points into `options` of both locales.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub en: LocalizedQuestion,
    pub ru: LocalizedQuestion,
    pub correct_answer_index: u8,
    pub difficulty: Difficulty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectBlock {
    pub subject: Subject,
    pub questions: Vec<Question>,
}

/// Validated skill-check content returned by `GET /api/generate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionPayload {
    pub generated_by: String,
    pub subjects: Vec<SubjectBlock>,
}

impl QuestionPayload {
    pub fn question_count(&self) -> usize {
        self.subjects.iter().map(|s| s.questions.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_wire_names_match_display_names() {
        for subject in Subject::ALL {
            let json = serde_json::to_string(&subject).unwrap();
            assert_eq!(json, format!("\"{}\"", subject.as_str()));
            assert_eq!(Subject::parse(subject.as_str()), Some(subject));
        }
    }

    #[test]
    fn unknown_subject_does_not_parse() {
        assert_eq!(Subject::parse("Rust"), None);
        assert_eq!(Subject::parse("c#"), None);
    }

    #[test]
    fn difficulty_is_lowercase_on_the_wire() {
        assert_eq!(serde_json::to_string(&Difficulty::Hard).unwrap(), "\"hard\"");
        assert_eq!(Difficulty::parse("medium"), Some(Difficulty::Medium));
        assert_eq!(Difficulty::parse("Medium"), None);
    }
}
