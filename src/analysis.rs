use crate::models::{AnalysisResult, StructuredAnalysis};
use log::debug;
use serde_json::Value;

/// Turn the raw `analysis` payload into something displayable.
///
/// Objects carrying `overall_assessment` become structured analysis. Text is tried as JSON
/// whole, then as a fenced ```json block, then as the first balanced `{...}`; text that
/// yields no structured analysis is shown as narrative. `None` means nothing to show.
pub fn resolve_analysis(raw: Option<&Value>) -> Option<AnalysisResult> {
    match raw? {
        Value::Null => None,
        Value::String(text) => resolve_text(text),
        value @ Value::Object(_) => Some(
            structured_from_value(value)
                .map(AnalysisResult::Structured)
                .unwrap_or_else(|| AnalysisResult::Narrative(value.to_string())),
        ),
        other => Some(AnalysisResult::Narrative(other.to_string())),
    }
}

fn structured_from_value(value: &Value) -> Option<StructuredAnalysis> {
    value.get("overall_assessment")?;
    match serde_json::from_value(value.clone()) {
        Ok(analysis) => Some(analysis),
        Err(err) => {
            debug!("Analysis object did not match the structured layout: {}", err);
            None
        }
    }
}

fn resolve_text(text: &str) -> Option<AnalysisResult> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    let candidates = [
        Some(trimmed),
        fenced_block(trimmed),
        first_balanced_object(trimmed),
    ];
    for candidate in candidates.into_iter().flatten() {
        match serde_json::from_str::<Value>(candidate) {
            // Double-encoded payloads arrive as a JSON string holding the JSON text.
            Ok(Value::String(inner)) if inner.trim() != trimmed => return resolve_text(&inner),
            Ok(value) => {
                if let Some(analysis) = structured_from_value(&value) {
                    return Some(AnalysisResult::Structured(analysis));
                }
            }
            Err(err) => debug!("Analysis candidate is not JSON: {}", err),
        }
    }

    Some(AnalysisResult::Narrative(trimmed.to_string()))
}

fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after = &text[start + 3..];
    let after = after
        .strip_prefix("json")
        .or_else(|| after.strip_prefix("JSON"))
        .unwrap_or(after);
    let end = after.find("```")?;
    let block = after[..end].trim();
    (!block.is_empty()).then_some(block)
}

fn first_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn structured_payload() -> Value {
        json!({
            "overall_assessment": { "rating": "Good", "summary": "Consistent edge." },
            "key_insights": ["Returns are positive in most paths"],
            "risk_management": {
                "current_assessment": "Moderate",
                "recommendations": ["Tighten stop loss"]
            },
            "strategy_optimization": {
                "strengths": ["Simple rules"],
                "weaknesses": ["Few trades"],
                "improvements": ["Add a trend filter"]
            },
            "position_sizing": {
                "current_analysis": "10% per trade",
                "recommendation": "Keep"
            }
        })
    }

    #[test]
    fn absent_or_null_analysis_resolves_to_none() {
        assert_eq!(resolve_analysis(None), None);
        assert_eq!(resolve_analysis(Some(&Value::Null)), None);
        assert_eq!(resolve_analysis(Some(&json!("   "))), None);
    }

    #[test]
    fn object_with_assessment_is_structured() {
        let payload = structured_payload();
        let Some(AnalysisResult::Structured(analysis)) = resolve_analysis(Some(&payload)) else {
            panic!("expected structured analysis");
        };
        assert_eq!(analysis.overall_assessment.rating, "Good");
        assert_eq!(analysis.strategy_optimization.improvements.len(), 1);
    }

    #[test]
    fn serialized_string_is_parsed() {
        let text = Value::String(structured_payload().to_string());
        assert!(matches!(
            resolve_analysis(Some(&text)),
            Some(AnalysisResult::Structured(_))
        ));
    }

    #[test]
    fn fenced_and_embedded_json_are_extracted() {
        let fenced = format!(
            "Here is the analysis:\n```json\n{}\n```\nThanks.",
            structured_payload()
        );
        assert!(matches!(
            resolve_analysis(Some(&Value::String(fenced))),
            Some(AnalysisResult::Structured(_))
        ));

        let embedded = format!("Result follows {} end", structured_payload());
        assert!(matches!(
            resolve_analysis(Some(&Value::String(embedded))),
            Some(AnalysisResult::Structured(_))
        ));
    }

    #[test]
    fn double_encoded_string_is_unwrapped() {
        let inner = structured_payload().to_string();
        let outer = Value::String(Value::String(inner).to_string());
        assert!(matches!(
            resolve_analysis(Some(&outer)),
            Some(AnalysisResult::Structured(_))
        ));
    }

    #[test]
    fn plain_text_is_narrative() {
        let text = json!("The strategy looks fragile {not json}.");
        assert_eq!(
            resolve_analysis(Some(&text)),
            Some(AnalysisResult::Narrative(
                "The strategy looks fragile {not json}.".to_string()
            ))
        );
    }

    #[test]
    fn object_without_assessment_is_narrative() {
        let payload = json!({ "note": "missing sections" });
        assert!(matches!(
            resolve_analysis(Some(&payload)),
            Some(AnalysisResult::Narrative(_))
        ));
    }

    #[test]
    fn balanced_scan_ignores_braces_in_strings() {
        let text = r#"prefix {"a": "}", "b": {"c": 1}} suffix"#;
        assert_eq!(
            first_balanced_object(text),
            Some(r#"{"a": "}", "b": {"c": 1}}"#)
        );
    }
}
