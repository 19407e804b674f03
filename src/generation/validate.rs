// src/generation/validate.rs

//! Turns raw completion text into a `QuestionPayload`, reporting every broken
//! rule at once instead of stopping at the first one.
//!
//! Two passes: a shape pass over the raw JSON (presence and types, which serde
//! would otherwise report one at a time), then `validator` rules on the
//! deserialized wire types.

use std::collections::BTreeSet;

use serde::Deserialize;
use serde_json::Value;
use validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};

use super::error::{GenerationError, Violation};
use crate::{
    config::MIN_QUESTIONS_PER_SUBJECT,
    models::question::{Difficulty, GENERATED_BY, QuestionPayload, Subject},
};

/// Parses, normalizes and validates a completion.
pub fn parse_payload(text: &str) -> Result<QuestionPayload, GenerationError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(GenerationError::Parse(
            "Empty response from Gemini AI".to_string(),
        ));
    }

    let mut value: Value =
        serde_json::from_str(text).map_err(|e| GenerationError::Parse(e.to_string()))?;

    if let Some(previous) = normalize_generated_by(&mut value) {
        tracing::warn!(
            "Backend returned generatedBy={}, rewriting to '{}'",
            previous,
            GENERATED_BY
        );
    }

    let violations = check_payload(&value);
    if !violations.is_empty() {
        return Err(GenerationError::Validation(violations));
    }

    serde_json::from_value(value)
        .map_err(|e| GenerationError::Validation(vec![Violation::new("$", e.to_string())]))
}

/// Forces the top-level `generatedBy` to the required marker.
/// Returns the replaced value (`null` when absent) if anything changed.
pub fn normalize_generated_by(value: &mut Value) -> Option<Value> {
    let obj = value.as_object_mut()?;
    let current = obj.get("generatedBy").cloned();
    if matches!(&current, Some(Value::String(s)) if s == GENERATED_BY) {
        return None;
    }

    obj.insert(
        "generatedBy".to_string(),
        Value::String(GENERATED_BY.to_string()),
    );
    Some(current.unwrap_or(Value::Null))
}

/// Every contract violation in `value`; empty when the payload is valid.
///
/// `generatedBy` is not checked: `parse_payload` normalizes it first.
/// Shape violations are reported on their own, since rule checks need a
/// well-typed payload.
pub fn check_payload(value: &Value) -> Vec<Violation> {
    let mut violations = Vec::new();
    check_shape(value, &PAYLOAD, "", &mut violations);
    if !violations.is_empty() {
        return violations;
    }

    let wire = match PayloadWire::deserialize(value) {
        Ok(wire) => wire,
        Err(e) => return vec![Violation::new("$", e.to_string())],
    };

    if let Err(errors) = wire.validate() {
        collect_violations(&errors, "", &mut violations);
        violations.sort_by(|a, b| a.path.cmp(&b.path));
    }
    violations
}

// Shape pass

enum Shape {
    Object(&'static [(&'static str, Shape)]),
    ArrayOf(&'static Shape),
    String,
    Index,
}

const LOCALIZED: Shape = Shape::Object(&[
    ("question", Shape::String),
    ("options", Shape::ArrayOf(&Shape::String)),
    ("topic", Shape::String),
]);

const QUESTION: Shape = Shape::Object(&[
    ("en", LOCALIZED),
    ("ru", LOCALIZED),
    ("correctAnswerIndex", Shape::Index),
    ("difficulty", Shape::String),
]);

const SUBJECT_BLOCK: Shape = Shape::Object(&[
    ("subject", Shape::String),
    ("questions", Shape::ArrayOf(&QUESTION)),
]);

const PAYLOAD: Shape = Shape::Object(&[("subjects", Shape::ArrayOf(&SUBJECT_BLOCK))]);

impl Shape {
    fn expected(&self) -> &'static str {
        match self {
            Shape::Object(_) => "an object",
            Shape::ArrayOf(_) => "an array",
            Shape::String => "a string",
            Shape::Index => "a non-negative integer",
        }
    }
}

fn found(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(_) => "a boolean".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(_) => "a string".to_string(),
        Value::Array(_) => "an array".to_string(),
        Value::Object(_) => "an object".to_string(),
    }
}

fn join(path: &str, field: &str) -> String {
    if path.is_empty() {
        field.to_string()
    } else {
        format!("{}.{}", path, field)
    }
}

fn check_shape(value: &Value, shape: &Shape, path: &str, out: &mut Vec<Violation>) {
    match (shape, value) {
        (Shape::Object(fields), Value::Object(map)) => {
            for (name, field_shape) in fields.iter() {
                let field_path = join(path, name);
                match map.get(*name) {
                    Some(field) => check_shape(field, field_shape, &field_path, out),
                    None => out.push(Violation::new(field_path, "is required")),
                }
            }
        }
        (Shape::ArrayOf(item), Value::Array(items)) => {
            for (i, value) in items.iter().enumerate() {
                check_shape(value, item, &format!("{}[{}]", path, i), out);
            }
        }
        (Shape::String, Value::String(_)) => {}
        (Shape::Index, Value::Number(n)) if n.is_u64() => {}
        (shape, value) => {
            let path = if path.is_empty() { "$" } else { path };
            out.push(Violation::new(
                path,
                format!("expected {}, found {}", shape.expected(), found(value)),
            ));
        }
    }
}

// Rule pass

#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = validate_subject_coverage, skip_on_field_errors = false))]
struct PayloadWire {
    #[validate(nested)]
    subjects: Vec<SubjectBlockWire>,
}

#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = validate_question_count, skip_on_field_errors = false))]
struct SubjectBlockWire {
    #[validate(custom(function = validate_subject_name))]
    subject: String,
    #[validate(nested)]
    questions: Vec<QuestionWire>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct QuestionWire {
    #[validate(nested)]
    en: LocalizedWire,
    #[validate(nested)]
    ru: LocalizedWire,
    #[validate(range(max = 3, message = "expected an integer between 0 and 3"))]
    correct_answer_index: u64,
    #[validate(custom(function = validate_difficulty))]
    difficulty: String,
}

/// `question` and `topic` carry no rules beyond their shape.
#[derive(Debug, Deserialize, Validate)]
struct LocalizedWire {
    #[validate(length(equal = 4, message = "expected exactly 4 options"))]
    options: Vec<String>,
}

/// A struct-level error reported against one of the struct's fields.
fn field_error(field: &'static str, code: &'static str, message: String) -> ValidationError {
    let mut err = ValidationError::new(code).with_message(message.into());
    err.add_param("field".into(), &field);
    err
}

fn validate_subject_name(name: &str) -> Result<(), ValidationError> {
    match Subject::parse(name) {
        Some(_) => Ok(()),
        None => Err(ValidationError::new("unknown_subject")
            .with_message(format!("unknown subject '{}'", name).into())),
    }
}

fn validate_difficulty(value: &str) -> Result<(), ValidationError> {
    match Difficulty::parse(value) {
        Some(_) => Ok(()),
        None => Err(ValidationError::new("difficulty")
            .with_message(format!("expected easy, medium or hard, found '{}'", value).into())),
    }
}

fn validate_question_count(block: &SubjectBlockWire) -> Result<(), ValidationError> {
    if block.questions.len() >= MIN_QUESTIONS_PER_SUBJECT {
        return Ok(());
    }
    Err(field_error(
        "questions",
        "too_few_questions",
        format!(
            "expected at least {} questions, found {}",
            MIN_QUESTIONS_PER_SUBJECT,
            block.questions.len()
        ),
    ))
}

/// Exactly the six subjects, each once. Unknown names are reported per block.
fn validate_subject_coverage(payload: &PayloadWire) -> Result<(), ValidationError> {
    let mut problems = Vec::new();

    if payload.subjects.len() != Subject::ALL.len() {
        problems.push(format!(
            "expected exactly {} subjects, found {}",
            Subject::ALL.len(),
            payload.subjects.len()
        ));
    }

    let mut seen = BTreeSet::new();
    let mut duplicates = Vec::new();
    for subject in payload.subjects.iter().filter_map(|b| Subject::parse(&b.subject)) {
        if !seen.insert(subject) {
            duplicates.push(subject.as_str());
        }
    }
    if !duplicates.is_empty() {
        problems.push(format!("duplicate subjects: {}", duplicates.join(", ")));
    }

    let missing: Vec<&str> = Subject::ALL
        .iter()
        .filter(|s| !seen.contains(*s))
        .map(Subject::as_str)
        .collect();
    if !missing.is_empty() {
        problems.push(format!("missing subjects: {}", missing.join(", ")));
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(field_error("subjects", "subject_coverage", problems.join("; ")))
    }
}

/// `correct_answer_index` -> `correctAnswerIndex`, matching the wire names.
fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

fn describe(err: &ValidationError) -> String {
    let message = err
        .message
        .as_ref()
        .map(|m| m.to_string())
        .unwrap_or_else(|| err.code.to_string());

    match err.params.get("value") {
        Some(value) if err.code == "range" => format!("{}, found {}", message, value),
        _ => message,
    }
}

fn collect_violations(errors: &ValidationErrors, path: &str, out: &mut Vec<Violation>) {
    for (field, kind) in errors.errors() {
        match kind {
            ValidationErrorsKind::Field(list) => {
                for err in list {
                    let field_path = if field == "__all__" {
                        match err.params.get("field").and_then(Value::as_str) {
                            Some(target) => join(path, target),
                            None if path.is_empty() => "$".to_string(),
                            None => path.to_string(),
                        }
                    } else {
                        join(path, &camel_case(field))
                    };
                    out.push(Violation::new(field_path, describe(err)));
                }
            }
            ValidationErrorsKind::Struct(inner) => {
                collect_violations(inner, &join(path, &camel_case(field)), out);
            }
            ValidationErrorsKind::List(items) => {
                let list_path = join(path, &camel_case(field));
                for (i, inner) in items {
                    collect_violations(inner, &format!("{}[{}]", list_path, i), out);
                }
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::valid_payload;
    use super::*;

    fn violations_of(value: &Value) -> Vec<String> {
        check_payload(value).iter().map(|v| v.to_string()).collect()
    }

    fn json_str(s: &str) -> Value {
        Value::String(s.to_string())
    }

    #[test]
    fn valid_payload_parses() {
        let payload = parse_payload(&valid_payload().to_string()).unwrap();
        assert_eq!(payload.generated_by, GENERATED_BY);
        assert_eq!(payload.subjects.len(), 6);
        assert_eq!(payload.question_count(), 60);
        assert_eq!(payload.subjects[3].subject, Subject::CSharp);
    }

    #[test]
    fn generated_by_is_rewritten_not_rejected() {
        for marker in [json_str("AI-Assistant"), Value::Null, Value::from(5)] {
            let mut value = valid_payload();
            value["generatedBy"] = marker;
            let payload = parse_payload(&value.to_string()).unwrap();
            assert_eq!(payload.generated_by, "Gemini AI");
        }

        let mut value = valid_payload();
        value.as_object_mut().unwrap().remove("generatedBy");
        assert!(parse_payload(&value.to_string()).is_ok());
    }

    #[test]
    fn check_payload_ignores_generated_by() {
        let mut value = valid_payload();
        value["generatedBy"] = json_str("Somebody else");
        assert!(check_payload(&value).is_empty());
    }

    #[test]
    fn normalizing_twice_changes_nothing_the_second_time() {
        let mut value = valid_payload();
        value["generatedBy"] = json_str("Google");
        assert_eq!(normalize_generated_by(&mut value), Some(json_str("Google")));
        assert_eq!(normalize_generated_by(&mut value), None);
    }

    #[test]
    fn empty_and_malformed_text_are_parse_errors() {
        assert!(matches!(parse_payload("   "), Err(GenerationError::Parse(_))));
        assert!(matches!(
            parse_payload("```json\n{}\n```"),
            Err(GenerationError::Parse(_))
        ));
        assert!(matches!(parse_payload("{\"subjects\": ["), Err(GenerationError::Parse(_))));
    }

    #[test]
    fn every_rule_violation_is_reported() {
        let mut value = valid_payload();
        value["subjects"][0]["questions"][1]["en"]["options"] =
            serde_json::json!(["only", "three", "here"]);
        value["subjects"][2]["questions"][4]["correctAnswerIndex"] = Value::from(4);
        value["subjects"][3]["questions"][0]["difficulty"] = json_str("extreme");

        let violations = violations_of(&value);

        assert_eq!(
            violations,
            vec![
                "subjects[0].questions[1].en.options: expected exactly 4 options".to_string(),
                "subjects[2].questions[4].correctAnswerIndex: expected an integer between 0 and 3, found 4"
                    .to_string(),
                "subjects[3].questions[0].difficulty: expected easy, medium or hard, found 'extreme'"
                    .to_string(),
            ]
        );

        match parse_payload(&value.to_string()) {
            Err(GenerationError::Validation(v)) => assert_eq!(v.len(), 3),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn every_shape_violation_is_reported() {
        let mut value = valid_payload();
        value["subjects"][5]["questions"][9]
            .as_object_mut()
            .unwrap()
            .remove("ru");
        value["subjects"][1]["questions"][2]["en"]["options"][3] = Value::from(7);
        value["subjects"][4]["questions"][0]["correctAnswerIndex"] = serde_json::json!(1.5);

        let violations = violations_of(&value);

        assert_eq!(violations.len(), 3, "{violations:#?}");
        assert!(violations.contains(&"subjects[5].questions[9].ru: is required".to_string()));
        assert!(violations.contains(
            &"subjects[1].questions[2].en.options[3]: expected a string, found 7".to_string()
        ));
        assert!(violations.contains(
            &"subjects[4].questions[0].correctAnswerIndex: expected a non-negative integer, found 1.5"
                .to_string()
        ));
    }

    #[test]
    fn subject_coverage_rules() {
        let mut value = valid_payload();
        value["subjects"][1]["subject"] = json_str("JavaScript");

        assert_eq!(
            violations_of(&value),
            vec!["subjects: duplicate subjects: JavaScript; missing subjects: TypeScript".to_string()]
        );
    }

    #[test]
    fn wrong_subject_count_and_unknown_name() {
        let mut value = valid_payload();
        let subjects = value["subjects"].as_array_mut().unwrap();
        subjects.pop();
        subjects[0]["subject"] = json_str("Rust");

        let violations = violations_of(&value);
        assert!(violations.contains(
            &"subjects: expected exactly 6 subjects, found 5; missing subjects: JavaScript, C++"
                .to_string()
        ));
        assert!(violations.contains(&"subjects[0].subject: unknown subject 'Rust'".to_string()));
    }

    #[test]
    fn too_few_questions_alongside_question_errors() {
        let mut value = valid_payload();
        value["subjects"][4]["questions"].as_array_mut().unwrap().truncate(9);
        value["subjects"][4]["questions"][0]["difficulty"] = json_str("trivial");

        let violations = violations_of(&value);
        assert_eq!(violations.len(), 2, "{violations:#?}");
        assert!(violations.contains(
            &"subjects[4].questions: expected at least 10 questions, found 9".to_string()
        ));
        assert!(violations.contains(
            &"subjects[4].questions[0].difficulty: expected easy, medium or hard, found 'trivial'"
                .to_string()
        ));
    }

    #[test]
    fn more_than_ten_questions_is_fine() {
        let mut value = valid_payload();
        value["subjects"][0]["questions"]
            .as_array_mut()
            .unwrap()
            .push(super::fixtures::question(10));
        assert!(check_payload(&value).is_empty());
    }

    #[test]
    fn non_object_root_is_a_single_violation() {
        assert_eq!(
            violations_of(&serde_json::json!([1, 2])),
            vec!["$: expected an object, found an array".to_string()]
        );
    }

    #[test]
    fn missing_subjects_is_required() {
        assert_eq!(
            violations_of(&serde_json::json!({ "generatedBy": "Gemini AI" })),
            vec!["subjects: is required".to_string()]
        );
    }

    #[test]
    fn field_names_follow_the_wire_format() {
        assert_eq!(camel_case("correct_answer_index"), "correctAnswerIndex");
        assert_eq!(camel_case("options"), "options");
    }
}
