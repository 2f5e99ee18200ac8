//! Parsing the model's JSON answer.
//!
//! The model is asked for a single object `{ html, css, explanation }`.
//! Models wrap it in prose or code fences and sprinkle control characters,
//! so the object is cut out between the first `{` and the last `}` before
//! it is deserialized.

use facet::Facet;

/// Why a model answer could not be used.
#[derive(Facet, Debug, Clone, PartialEq, Eq)]
#[facet(derive(Error))]
#[repr(u8)]
pub enum ResponseError {
    /// no JSON object found in the model response
    NoJsonObject,

    /// invalid JSON in the model response: {message}
    InvalidJson { message: String },

    /// the model response has no html
    MissingHtml,

    /// the model response has no explanation
    MissingExplanation,
}

/// Wire shape, including the earlier `message` / `isNewWebsite` variant.
#[derive(Facet, Debug, Default)]
#[facet(rename_all = "camelCase")]
struct RawResponse {
    #[facet(default)]
    html: Option<String>,
    #[facet(default)]
    css: Option<String>,
    #[facet(default)]
    explanation: Option<String>,
    #[facet(default)]
    message: Option<String>,
    #[facet(default)]
    is_new_website: Option<bool>,
}

/// A usable generation result.
#[derive(Facet, Debug, Clone, PartialEq, Eq)]
#[facet(rename_all = "camelCase")]
pub struct GenerationResponse {
    pub html: String,
    pub css: String,
    pub explanation: String,
    pub is_new_website: bool,
}

/// Removes C0 and C1 control characters.
fn strip_control(raw: &str) -> String {
    raw.chars()
        .filter(|&c| !matches!(c, '\u{0}'..='\u{1f}' | '\u{7f}'..='\u{9f}'))
        .collect()
}

/// The substring from the first `{` to the last `}`, inclusive.
fn json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

pub fn parse_generation_response(raw: &str) -> Result<GenerationResponse, ResponseError> {
    let cleaned = strip_control(raw);
    let json = json_object(&cleaned).ok_or(ResponseError::NoJsonObject)?;

    let parsed: RawResponse =
        facet_json::from_str(json).map_err(|e| ResponseError::InvalidJson {
            message: e.to_string(),
        })?;

    let html = parsed
        .html
        .filter(|html| !html.trim().is_empty())
        .ok_or(ResponseError::MissingHtml)?;
    let explanation = parsed
        .explanation
        .or(parsed.message)
        .ok_or(ResponseError::MissingExplanation)?;

    Ok(GenerationResponse {
        html,
        css: parsed.css.unwrap_or_default(),
        explanation,
        is_new_website: parsed.is_new_website.unwrap_or(false),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_testhelpers::test;

    #[test]
    fn parses_plain_object() {
        let res = parse_generation_response(
            r#"{"html":"<p>Hi</p>","css":"p{color:red}","explanation":"Made a page"}"#,
        )
        .unwrap();
        assert_eq!(res.html, "<p>Hi</p>");
        assert_eq!(res.css, "p{color:red}");
        assert_eq!(res.explanation, "Made a page");
        assert!(!res.is_new_website);
    }

    #[test]
    fn tolerates_fences_and_control_characters() {
        let raw = "Sure!\n```json\n{\"html\": \"<h1>T</h1>\",\u{7}\n \"explanation\": \"ok\"}\n```\u{0}";
        let res = parse_generation_response(raw).unwrap();
        assert_eq!(res.html, "<h1>T</h1>");
        assert_eq!(res.css, "");
    }

    #[test]
    fn earlier_protocol_fields() {
        let res = parse_generation_response(
            r#"{"html":"<p>x</p>","message":"Built it","isNewWebsite":true}"#,
        )
        .unwrap();
        assert_eq!(res.explanation, "Built it");
        assert!(res.is_new_website);
    }

    #[test]
    fn missing_html_is_an_error() {
        assert_eq!(
            parse_generation_response(r#"{"css":"","explanation":"x"}"#),
            Err(ResponseError::MissingHtml)
        );
        assert_eq!(
            parse_generation_response(r#"{"html":"  ","explanation":"x"}"#),
            Err(ResponseError::MissingHtml)
        );
    }

    #[test]
    fn missing_explanation_is_an_error() {
        assert_eq!(
            parse_generation_response(r#"{"html":"<p>x</p>"}"#),
            Err(ResponseError::MissingExplanation)
        );
    }

    #[test]
    fn non_string_explanation_is_an_error() {
        assert!(matches!(
            parse_generation_response(r#"{"html":"<p>x</p>","explanation":42}"#),
            Err(ResponseError::InvalidJson { .. })
        ));
    }

    #[test]
    fn no_object_at_all() {
        assert_eq!(
            parse_generation_response("I cannot do that"),
            Err(ResponseError::NoJsonObject)
        );
        assert_eq!(
            parse_generation_response("} backwards {"),
            Err(ResponseError::NoJsonObject)
        );
    }
}
