//! APIレスポンスパーサー
//!
//! チャット補完のテキストからコードフェンスを除去し、
//! AnalysisResultとして検証する

use crate::error::{Error, Result};
use crate::types::{AnalysisResult, FlaggedItem, Recommendation};
use regex::Regex;
use serde_json::Value;

lazy_static::lazy_static! {
    // 先頭の ``` （任意で json 言語タグ）
    static ref LEADING_FENCE: Regex = Regex::new(r"(?i)^```(?:json)?\s*").unwrap();
    // 末尾の ```
    static ref TRAILING_FENCE: Regex = Regex::new(r"\s*```$").unwrap();
}

/// 補完テキストを囲むコードフェンスを除去
///
/// # Examples
/// ```
/// use nutrisnap_common::strip_code_fence;
///
/// let text = "```json\n{\"recommendations\": []}\n```";
/// assert_eq!(strip_code_fence(text), "{\"recommendations\": []}");
/// ```
pub fn strip_code_fence(response: &str) -> String {
    let trimmed = response.trim();
    let without_leading = LEADING_FENCE.replace(trimmed, "");
    let without_trailing = TRAILING_FENCE.replace(&without_leading, "");
    without_trailing.trim().to_string()
}

/// 補完テキストをAnalysisResultとしてパース
///
/// - recommendations が配列でなければエラー
/// - flaggedItems が無い・不正な場合は空配列として扱う
/// - generalNotes が文字列でなければ無視
///
/// # Arguments
/// * `response` - 補完テキスト（コードフェンス付きでも可）
///
/// # Returns
/// * `Ok(AnalysisResult)` - パース成功
/// * `Err(Error::Format)` - JSONでない、またはrecommendationsが不正
pub fn parse_analysis_response(response: &str) -> Result<AnalysisResult> {
    let cleaned = strip_code_fence(response);

    let value: Value = serde_json::from_str(&cleaned)
        .map_err(|e| Error::Format(format!("invalid JSON: {}", e)))?;

    let Value::Object(mut object) = value else {
        return Err(Error::Format("top-level value is not an object".into()));
    };

    let recommendations = match object.remove("recommendations") {
        Some(list @ Value::Array(_)) => serde_json::from_value::<Vec<Recommendation>>(list)
            .map_err(|e| Error::Format(format!("invalid recommendations: {}", e)))?,
        _ => {
            return Err(Error::Format(
                "missing or invalid recommendations".into(),
            ))
        }
    };

    let flagged_items = match object.remove("flaggedItems") {
        Some(list @ Value::Array(_)) => {
            serde_json::from_value::<Vec<FlaggedItem>>(list).unwrap_or_default()
        }
        _ => Vec::new(),
    };

    let general_notes = match object.remove("generalNotes") {
        Some(Value::String(notes)) => Some(notes),
        _ => None,
    };

    Ok(AnalysisResult {
        recommendations,
        flagged_items,
        general_notes,
    })
}
