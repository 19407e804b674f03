// src/generation/prompt.rs

use rand::{Rng, distributions::Alphanumeric};
use serde_json::{Value, json};

use crate::{
    config::MIN_QUESTIONS_PER_SUBJECT,
    models::question::{GENERATED_BY, Subject},
};

/// Topic hints per subject. Editing this table (and `Subject`) is all it takes
/// to change what the AI is asked about.
const SUBJECT_TOPICS: [(Subject, &str); 6] = [
    (
        Subject::JavaScript,
        "closures, async/await, promises, the event loop, hoisting, scope, prototypes, ES6+ features, DOM manipulation, error handling, modules",
    ),
    (
        Subject::TypeScript,
        "type annotations, interfaces, generics, type inference, enums, unions, intersections, decorators, utility types, type guards",
    ),
    (
        Subject::Python,
        "list comprehensions, generators, decorators, context managers, exception handling, OOP, data structures, lambdas, modules and packages",
    ),
    (
        Subject::CSharp,
        "LINQ, async/await, tasks, generics, collections, value vs reference types, nullability, exceptions, interfaces, records, pattern matching, .NET basics",
    ),
    (
        Subject::Flutter,
        "widgets, state management (setState, Provider, Riverpod, Bloc), widget lifecycle, Row/Column/Flex layout, navigation, async/await, isolates, performance (Dart/Flutter context)",
    ),
    (
        Subject::Cpp,
        "RAII, pointers and references, const correctness, move semantics, templates, STL containers and algorithms, smart pointers, compilation and linking, OOP",
    ),
];

const PROMPT_TEMPLATE: &str = r#"Create a skill-check assessment of multiple-choice questions for EXACTLY these {subject_count} subjects, each subject exactly once: {subject_list}.

Cover a WIDE VARIETY of topics, concepts and scenarios. Do not repeat question patterns or topics; every question must be distinct.

**EVERY QUESTION MUST BE WRITTEN IN BOTH ENGLISH AND RUSSIAN**

For each question provide:
- "en": an object with "question" (English), "options" (4 English options) and "topic" (English)
- "ru": an object with "question" (Russian), "options" (4 Russian options) and "topic" (Russian)
- "correctAnswerIndex": the zero-based index of the correct option, identical for both languages
- "difficulty": one of "easy", "medium", "hard"

JSON RULES:
- Reply with valid JSON only: no markdown, no code fences, no comments.
- The top-level object MUST contain "generatedBy": "{generated_by}" (this exact string) and "subjects": [...].
- Each element of "subjects" is {"subject": <name>, "questions": [...]} where <name> is spelled exactly as listed above.

Topics to draw from:
{topic_hints}

Each subject must contain exactly {question_count} questions of mixed difficulty. There must be exactly {subject_count} subjects.

Every question has exactly four answer options.

Mix question styles: theory, code reading, scenarios, best practices.

Return nothing but the JSON object.

Session ID: {session_id}"#;

/// Very small `{key}` templating.
fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
    let mut out = tpl.to_string();
    for (k, v) in pairs {
        let needle = format!("{{{}}}", k);
        out = out.replace(&needle, v);
    }
    out
}

/// `<unix millis>-<random token>`, appended to every prompt so repeated calls
/// do not get byte-identical completions.
pub fn session_id() -> String {
    let token: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("{}-{}", chrono::Utc::now().timestamp_millis(), token)
}

pub fn build_prompt(session_id: &str) -> String {
    let subject_list = Subject::ALL
        .iter()
        .map(Subject::as_str)
        .collect::<Vec<_>>()
        .join(", ");

    let topic_hints = SUBJECT_TOPICS
        .iter()
        .map(|(subject, topics)| format!("- {}: {}.", subject, topics))
        .collect::<Vec<_>>()
        .join("\n");

    fill_template(
        PROMPT_TEMPLATE,
        &[
            ("subject_count", &Subject::ALL.len().to_string()),
            ("subject_list", &subject_list),
            ("generated_by", GENERATED_BY),
            ("topic_hints", &topic_hints),
            ("question_count", &MIN_QUESTIONS_PER_SUBJECT.to_string()),
            ("session_id", session_id),
        ],
    )
}

fn localized_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "question": { "type": "string" },
            "options": { "type": "array", "items": { "type": "string" } },
            "topic": { "type": "string" }
        }
    })
}

/// Response schema sent to Gemini.
///
/// Deliberately loose: no enums, lengths or bounds. Gemini rejects tighter
/// schemas with "too many states for serving"; the full contract is checked by
/// `validate::parse_payload` instead.
pub fn response_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "generatedBy": { "type": "string" },
            "subjects": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "subject": { "type": "string" },
                        "questions": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "en": localized_schema(),
                                    "ru": localized_schema(),
                                    "correctAnswerIndex": { "type": "integer" },
                                    "difficulty": { "type": "string" }
                                },
                                "required": ["en", "ru", "correctAnswerIndex", "difficulty"]
                            }
                        }
                    },
                    "required": ["subject", "questions"]
                }
            }
        },
        "required": ["generatedBy", "subjects"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_lists_every_subject_and_the_session() {
        let prompt = build_prompt("123-abc");

        assert!(prompt.contains("JavaScript, TypeScript, Python, C#, Flutter, C++"));
        for subject in Subject::ALL {
            assert!(prompt.contains(&format!("- {}:", subject)));
        }
        assert!(prompt.contains("\"generatedBy\": \"Gemini AI\""));
        assert!(prompt.contains("exactly 10 questions"));
        assert!(prompt.ends_with("Session ID: 123-abc"));
        assert!(!prompt.contains("{subject_count}"));
    }

    #[test]
    fn session_ids_differ() {
        let a = session_id();
        let b = session_id();
        assert_ne!(a, b);

        let (millis, token) = a.split_once('-').unwrap();
        assert!(millis.parse::<i64>().is_ok());
        assert_eq!(token.len(), 6);
    }

    #[test]
    fn schema_has_no_cardinality_constraints() {
        let schema = response_schema().to_string();
        assert!(schema.contains("\"correctAnswerIndex\""));
        for keyword in ["minItems", "maxItems", "enum", "minimum", "maximum"] {
            assert!(!schema.contains(keyword), "{keyword} must not be sent");
        }
    }
}
