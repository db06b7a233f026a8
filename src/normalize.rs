use crate::notice::Notices;
use log::{info, warn};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as Json;
use thiserror::Error;

/// Opening fence of a JSON-tagged markdown code block
pub const JSON_FENCE: &str = "```json";

/// Bare markdown fence
pub const FENCE: &str = "```";

/// One chart request as recommended by the model
///
/// All fields are optional at this stage: the model's output is untrusted and
/// the chart mapper decides what is usable. A wrong JSON type in `chart_type`,
/// `x` or `y` rejects a record outright; `title` and `insight` are display
/// text and accept any scalar.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct ChartSpec {
    /// One of bar, line, scatter or pie, in any case
    pub chart_type: Option<String>,
    /// Column for categories or X positions
    pub x: Option<String>,
    /// Column holding the values
    pub y: Option<String>,
    /// Chart caption
    #[serde(default, deserialize_with = "lenient_text")]
    pub title: Option<String>,
    /// Why the model picked this chart
    #[serde(default, deserialize_with = "lenient_text")]
    pub insight: Option<String>,
}

/// Reads a string, or the JSON text of any other non-null value
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Json>::deserialize(deserializer)? {
        None | Some(Json::Null) => None,
        Some(Json::String(text)) => Some(text),
        Some(other) => Some(other.to_string()),
    })
}

/// Why a response could not be read as a chart list at all
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// The text left after fence stripping is not valid JSON
    #[error("{0}")]
    Json(#[from] serde_json::Error),

    /// Valid JSON of the wrong kind
    #[error("expected a JSON array of chart objects, found {0}")]
    NotAnArray(&'static str),
}

/// Chart specs decoded from one response
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChartList {
    /// Records that decoded, in response order
    pub specs: Vec<ChartSpec>,
    /// One line per array element that could not be read as a chart spec
    pub rejected: Vec<String>,
}

/// Removes markdown fencing around a model response
///
/// If an opening ```` ```json ```` fence is present, everything up to and
/// including its *last* occurrence is dropped. Then, if any ```` ``` ```` remains,
/// everything from its *first* occurrence on is dropped. The two steps use
/// different occurrence rules and must run in this order; a response fenced
/// with a bare ```` ``` ```` (no `json` tag) therefore strips to nothing.
///
/// # Examples
/// ```
/// use analyst::normalize::strip_fences;
///
/// assert_eq!(strip_fences("```json\n[1]\n```"), "\n[1]\n");
/// assert_eq!(strip_fences("[1]"), "[1]");
/// assert_eq!(strip_fences("```\n[1]\n```"), "");
/// ```
pub fn strip_fences(raw: &str) -> &str {
    let mut text = raw;

    if let Some(opening) = text.rfind(JSON_FENCE) {
        text = &text[opening + JSON_FENCE.len()..];
    }
    if let Some(closing) = text.find(FENCE) {
        text = &text[..closing];
    }

    text
}

/// Strips fencing and decodes the remainder as a list of [`ChartSpec`]
///
/// # Errors
/// * [`NormalizeError::Json`] when the text is not valid JSON
/// * [`NormalizeError::NotAnArray`] when the JSON is valid but not an array
pub fn parse_chart_list(raw: &str) -> Result<ChartList, NormalizeError> {
    let body = strip_fences(raw);
    let value: Json = serde_json::from_str(body)?;

    let Json::Array(items) = value else {
        return Err(NormalizeError::NotAnArray(json_kind(&value)));
    };

    let mut list = ChartList::default();
    for (index, item) in items.into_iter().enumerate() {
        if !item.is_object() {
            list.rejected
                .push(format!("item {} is {}, not an object", index, json_kind(&item)));
            continue;
        }
        match serde_json::from_value::<ChartSpec>(item) {
            Ok(spec) => list.specs.push(spec),
            Err(e) => list.rejected.push(format!("item {}: {}", index, e)),
        }
    }

    Ok(list)
}

/// Fail-soft wrapper around [`parse_chart_list`]
///
/// A parse failure becomes a warning notice and an empty list; rejected
/// elements each get their own warning while the rest are kept.
pub fn normalize_chart_list(raw: &str, notices: &mut Notices) -> Vec<ChartSpec> {
    match parse_chart_list(raw) {
        Ok(list) => {
            for reason in &list.rejected {
                warn!("Skipping chart record: {}", reason);
                notices.warning(format!("⚠️ Skipped chart record: {}", reason));
            }
            info!("Parsed {} chart specs", list.specs.len());
            list.specs
        }
        Err(e) => {
            warn!("Chart recommendations are not usable JSON: {}", e);
            notices.warning(format!("⚠️ JSON parse failed: {}", e));
            Vec::new()
        }
    }
}

fn json_kind(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "a boolean",
        Json::Number(_) => "a number",
        Json::String(_) => "a string",
        Json::Array(_) => "an array",
        Json::Object(_) => "an object",
    }
}
