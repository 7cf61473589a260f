//! Message parts and their flat row encoding.
//!
//! A [`Part`] is one piece of a streaming-chat SDK message. On the wire it is a
//! JSON object discriminated by `type`; in storage it is one `message_parts`
//! row where only the columns of its variant are populated.
//!
//! Parts whose `type` is not recognised are kept verbatim as [`Part::Opaque`]
//! so that newer clients never lose data through an older server.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use sqlx::FromRow;
use thiserror::Error;

/// Prefix of custom data part types (`data-weather`, `data-booking`, ...).
pub const DATA_PART_PREFIX: &str = "data-";

/// Lifecycle of a tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolState {
    InputStreaming,
    InputAvailable,
    OutputAvailable,
    OutputError,
}

impl ToolState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolState::InputStreaming => "input-streaming",
            ToolState::InputAvailable => "input-available",
            ToolState::OutputAvailable => "output-available",
            ToolState::OutputError => "output-error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "input-streaming" => Some(ToolState::InputStreaming),
            "input-available" => Some(ToolState::InputAvailable),
            "output-available" => Some(ToolState::OutputAvailable),
            "output-error" => Some(ToolState::OutputError),
            _ => None,
        }
    }

    /// Derive the state from which fields are populated.
    pub fn infer(input: Option<&Value>, output: Option<&Value>, error_text: Option<&str>) -> Self {
        if error_text.is_some() {
            ToolState::OutputError
        } else if output.is_some() {
            ToolState::OutputAvailable
        } else if input.is_some() {
            ToolState::InputAvailable
        } else {
            ToolState::InputStreaming
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextPart {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_metadata: Option<Value>,
    /// Wire fields this server does not model, kept as received.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasoningPart {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_metadata: Option<Value>,
    /// Wire fields this server does not model, kept as received.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePart {
    pub media_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_metadata: Option<Value>,
    /// Wire fields this server does not model, kept as received.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceUrlPart {
    pub source_id: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_metadata: Option<Value>,
    /// Wire fields this server does not model, kept as received.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDocumentPart {
    pub source_id: String,
    pub media_type: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_metadata: Option<Value>,
    /// Wire fields this server does not model, kept as received.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallPart {
    pub tool_call_id: String,
    pub tool_name: String,
    pub state: ToolState,
    #[serde(default)]
    pub input: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_metadata: Option<Value>,
    /// Wire fields this server does not model, kept as received.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResultPart {
    pub tool_call_id: String,
    pub tool_name: String,
    pub state: ToolState,
    #[serde(default)]
    pub input: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_metadata: Option<Value>,
    /// Wire fields this server does not model, kept as received.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Custom `data-*` part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPart {
    /// Full type tag, including the `data-` prefix.
    #[serde(skip)]
    pub data_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_metadata: Option<Value>,
    /// Wire fields this server does not model, kept as received.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One piece of a message.
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(TextPart),
    Reasoning(ReasoningPart),
    File(FilePart),
    SourceUrl(SourceUrlPart),
    SourceDocument(SourceDocumentPart),
    ToolCall(ToolCallPart),
    ToolResult(ToolResultPart),
    Data(DataPart),
    /// Any part this server does not model, kept as received.
    ///
    /// [`Part::from_value`] only produces this for unrecognised `type` tags.
    Opaque(Value),
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text(TextPart {
            text: text.into(),
            provider_metadata: None,
            extra: Map::new(),
        })
    }

    pub fn reasoning(text: impl Into<String>) -> Self {
        Part::Reasoning(ReasoningPart {
            text: text.into(),
            provider_metadata: None,
            extra: Map::new(),
        })
    }

    /// The `type` tag of this part.
    pub fn part_type(&self) -> &str {
        match self {
            Part::Text(_) => "text",
            Part::Reasoning(_) => "reasoning",
            Part::File(_) => "file",
            Part::SourceUrl(_) => "source-url",
            Part::SourceDocument(_) => "source-document",
            Part::ToolCall(_) => "tool-call",
            Part::ToolResult(_) => "tool-result",
            Part::Data(data) => &data.data_type,
            Part::Opaque(value) => value.get("type").and_then(Value::as_str).unwrap_or("unknown"),
        }
    }

    /// Render the wire JSON object.
    pub fn to_value(&self) -> serde_json::Result<Value> {
        let body = match self {
            Part::Text(p) => serde_json::to_value(p)?,
            Part::Reasoning(p) => serde_json::to_value(p)?,
            Part::File(p) => serde_json::to_value(p)?,
            Part::SourceUrl(p) => serde_json::to_value(p)?,
            Part::SourceDocument(p) => serde_json::to_value(p)?,
            Part::ToolCall(p) => serde_json::to_value(p)?,
            Part::ToolResult(p) => serde_json::to_value(p)?,
            Part::Data(p) => serde_json::to_value(p)?,
            Part::Opaque(value) => return Ok(value.clone()),
        };

        let mut object = match body {
            Value::Object(fields) => fields,
            _ => Map::new(),
        };
        object.insert("type".to_string(), Value::String(self.part_type().to_string()));
        Ok(Value::Object(object))
    }

    /// Parse a wire JSON object. Unrecognised types become [`Part::Opaque`].
    pub fn from_value(value: Value) -> serde_json::Result<Self> {
        let Value::Object(mut fields) = value else {
            return Ok(Part::Opaque(value));
        };
        let part_type = match fields.get("type").and_then(Value::as_str) {
            Some(part_type) if is_known_type(part_type) => part_type.to_owned(),
            _ => return Ok(Part::Opaque(Value::Object(fields))),
        };
        // The tag is carried by the variant; anything else left over lands in `extra`.
        fields.remove("type");
        let body = Value::Object(fields);

        let part = match part_type.as_str() {
            "text" => Part::Text(serde_json::from_value(body)?),
            "reasoning" => Part::Reasoning(serde_json::from_value(body)?),
            "file" => Part::File(serde_json::from_value(body)?),
            "source-url" => Part::SourceUrl(serde_json::from_value(body)?),
            "source-document" => Part::SourceDocument(serde_json::from_value(body)?),
            "tool-call" => Part::ToolCall(serde_json::from_value(body)?),
            "tool-result" => Part::ToolResult(serde_json::from_value(body)?),
            _ => {
                let mut data: DataPart = serde_json::from_value(body)?;
                data.data_type = part_type;
                Part::Data(data)
            }
        };
        Ok(part)
    }
}

fn is_known_type(part_type: &str) -> bool {
    matches!(
        part_type,
        "text"
            | "reasoning"
            | "file"
            | "source-url"
            | "source-document"
            | "tool-call"
            | "tool-result"
    ) || part_type.starts_with(DATA_PART_PREFIX)
}

impl Serialize for Part {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Part {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Part::from_value(value).map_err(D::Error::custom)
    }
}

/// Flat storage form of a part. Columns not used by the variant are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, FromRow)]
pub struct PartRow {
    pub ordinal: i64,
    pub part_type: String,
    pub text_value: Option<String>,
    pub file_media_type: Option<String>,
    pub file_filename: Option<String>,
    pub file_url: Option<String>,
    pub source_id: Option<String>,
    pub source_url: Option<String>,
    pub source_title: Option<String>,
    pub source_media_type: Option<String>,
    pub source_filename: Option<String>,
    pub tool_call_id: Option<String>,
    pub tool_name: Option<String>,
    pub tool_state: Option<String>,
    pub tool_input: Option<String>,
    pub tool_output: Option<String>,
    pub tool_error_text: Option<String>,
    pub data_id: Option<String>,
    pub payload: Option<String>,
    pub provider_metadata: Option<String>,
    /// Unmodelled wire fields of a known variant, as a JSON object.
    pub extra: Option<String>,
}

/// Failure to rebuild a part from its row.
#[derive(Debug, Error)]
pub enum PartDecodeError {
    #[error("part {ordinal} ({part_type}) has no value in column `{column}`")]
    MissingColumn {
        ordinal: i64,
        part_type: String,
        column: &'static str,
    },

    #[error("part {ordinal} ({part_type}) has malformed JSON in column `{column}`: {source}")]
    MalformedJson {
        ordinal: i64,
        part_type: String,
        column: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("part {ordinal} ({part_type}) column `{column}` is not a JSON object")]
    NotAnObject {
        ordinal: i64,
        part_type: String,
        column: &'static str,
    },
}

fn json_column(value: Option<&Value>) -> Option<String> {
    value.map(Value::to_string)
}

fn extra_column(extra: &Map<String, Value>) -> Option<String> {
    (!extra.is_empty()).then(|| Value::Object(extra.clone()).to_string())
}

/// Encode a part as the row stored at `ordinal`.
pub fn encode(part: &Part, ordinal: usize) -> PartRow {
    let mut row = PartRow {
        ordinal: ordinal as i64,
        part_type: part.part_type().to_string(),
        ..Default::default()
    };

    match part {
        Part::Text(p) => {
            row.text_value = Some(p.text.clone());
            row.provider_metadata = json_column(p.provider_metadata.as_ref());
            row.extra = extra_column(&p.extra);
        }
        Part::Reasoning(p) => {
            row.text_value = Some(p.text.clone());
            row.provider_metadata = json_column(p.provider_metadata.as_ref());
            row.extra = extra_column(&p.extra);
        }
        Part::File(p) => {
            row.file_media_type = Some(p.media_type.clone());
            row.file_filename = p.filename.clone();
            row.file_url = Some(p.url.clone());
            row.provider_metadata = json_column(p.provider_metadata.as_ref());
            row.extra = extra_column(&p.extra);
        }
        Part::SourceUrl(p) => {
            row.source_id = Some(p.source_id.clone());
            row.source_url = Some(p.url.clone());
            row.source_title = p.title.clone();
            row.provider_metadata = json_column(p.provider_metadata.as_ref());
            row.extra = extra_column(&p.extra);
        }
        Part::SourceDocument(p) => {
            row.source_id = Some(p.source_id.clone());
            row.source_media_type = Some(p.media_type.clone());
            row.source_title = Some(p.title.clone());
            row.source_filename = p.filename.clone();
            row.provider_metadata = json_column(p.provider_metadata.as_ref());
            row.extra = extra_column(&p.extra);
        }
        Part::ToolCall(p) => {
            row.tool_call_id = Some(p.tool_call_id.clone());
            row.tool_name = Some(p.tool_name.clone());
            row.tool_state = Some(p.state.as_str().to_string());
            row.tool_input = json_column(Some(&p.input));
            row.provider_metadata = json_column(p.provider_metadata.as_ref());
            row.extra = extra_column(&p.extra);
        }
        Part::ToolResult(p) => {
            row.tool_call_id = Some(p.tool_call_id.clone());
            row.tool_name = Some(p.tool_name.clone());
            row.tool_state = Some(p.state.as_str().to_string());
            row.tool_input = json_column(Some(&p.input));
            row.tool_output = json_column(p.output.as_ref());
            row.tool_error_text = p.error_text.clone();
            row.provider_metadata = json_column(p.provider_metadata.as_ref());
            row.extra = extra_column(&p.extra);
        }
        Part::Data(p) => {
            row.data_id = p.id.clone();
            row.payload = json_column(Some(&p.data));
            row.provider_metadata = json_column(p.provider_metadata.as_ref());
            row.extra = extra_column(&p.extra);
        }
        Part::Opaque(value) => {
            row.payload = json_column(Some(value));
        }
    }

    row
}

/// Rebuild a part from its row.
pub fn decode(row: &PartRow) -> Result<Part, PartDecodeError> {
    let required = |value: &Option<String>, column: &'static str| {
        value.clone().ok_or_else(|| PartDecodeError::MissingColumn {
            ordinal: row.ordinal,
            part_type: row.part_type.clone(),
            column,
        })
    };
    let json = |value: &Option<String>, column: &'static str| {
        value
            .as_deref()
            .map(|raw| serde_json::from_str::<Value>(raw))
            .transpose()
            .map_err(|source| PartDecodeError::MalformedJson {
                ordinal: row.ordinal,
                part_type: row.part_type.clone(),
                column,
                source,
            })
    };

    let provider_metadata = json(&row.provider_metadata, "provider_metadata")?;
    let extra = match json(&row.extra, "extra")? {
        None => Map::new(),
        Some(Value::Object(fields)) => fields,
        Some(_) => {
            return Err(PartDecodeError::NotAnObject {
                ordinal: row.ordinal,
                part_type: row.part_type.clone(),
                column: "extra",
            });
        }
    };

    let part = match row.part_type.as_str() {
        "text" => Part::Text(TextPart {
            text: required(&row.text_value, "text_value")?,
            provider_metadata,
            extra,
        }),
        "reasoning" => Part::Reasoning(ReasoningPart {
            text: required(&row.text_value, "text_value")?,
            provider_metadata,
            extra,
        }),
        "file" => Part::File(FilePart {
            media_type: required(&row.file_media_type, "file_media_type")?,
            filename: row.file_filename.clone(),
            url: required(&row.file_url, "file_url")?,
            provider_metadata,
            extra,
        }),
        "source-url" => Part::SourceUrl(SourceUrlPart {
            source_id: required(&row.source_id, "source_id")?,
            url: required(&row.source_url, "source_url")?,
            title: row.source_title.clone(),
            provider_metadata,
            extra,
        }),
        "source-document" => Part::SourceDocument(SourceDocumentPart {
            source_id: required(&row.source_id, "source_id")?,
            media_type: required(&row.source_media_type, "source_media_type")?,
            title: required(&row.source_title, "source_title")?,
            filename: row.source_filename.clone(),
            provider_metadata,
            extra,
        }),
        "tool-call" => {
            let input = json(&row.tool_input, "tool_input")?;
            let state = stored_tool_state(row)
                .unwrap_or_else(|| ToolState::infer(input.as_ref(), None, None));
            Part::ToolCall(ToolCallPart {
                tool_call_id: required(&row.tool_call_id, "tool_call_id")?,
                tool_name: required(&row.tool_name, "tool_name")?,
                state,
                input: input.unwrap_or(Value::Null),
                provider_metadata,
                extra,
            })
        }
        "tool-result" => {
            let input = json(&row.tool_input, "tool_input")?;
            let output = json(&row.tool_output, "tool_output")?;
            let state = stored_tool_state(row).unwrap_or_else(|| {
                ToolState::infer(
                    input.as_ref(),
                    output.as_ref(),
                    row.tool_error_text.as_deref(),
                )
            });
            Part::ToolResult(ToolResultPart {
                tool_call_id: required(&row.tool_call_id, "tool_call_id")?,
                tool_name: required(&row.tool_name, "tool_name")?,
                state,
                input: input.unwrap_or(Value::Null),
                output,
                error_text: row.tool_error_text.clone(),
                provider_metadata,
                extra,
            })
        }
        data_type if data_type.starts_with(DATA_PART_PREFIX) => Part::Data(DataPart {
            data_type: data_type.to_string(),
            id: row.data_id.clone(),
            data: json(&row.payload, "payload")?.unwrap_or(Value::Null),
            provider_metadata,
            extra,
        }),
        other => match json(&row.payload, "payload")? {
            Some(value) => Part::Opaque(value),
            None => Part::Opaque(serde_json::json!({ "type": other })),
        },
    };

    Ok(part)
}

fn stored_tool_state(row: &PartRow) -> Option<ToolState> {
    row.tool_state.as_deref().and_then(ToolState::parse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn roundtrip(part: Part) {
        let row = encode(&part, 3);
        assert_eq!(row.ordinal, 3);
        assert_eq!(decode(&row).unwrap(), part);
    }

    #[test]
    fn test_roundtrip_every_variant() {
        roundtrip(Part::text("Book the garden room"));
        roundtrip(Part::Reasoning(ReasoningPart {
            text: "The client prefers outdoor venues".into(),
            provider_metadata: Some(json!({ "openai": { "itemId": "rs_1" } })),
            extra: Map::new(),
        }));
        roundtrip(Part::File(FilePart {
            media_type: "application/pdf".into(),
            filename: Some("floorplan.pdf".into()),
            url: "https://files.example.com/floorplan.pdf".into(),
            provider_metadata: None,
            extra: Map::new(),
        }));
        roundtrip(Part::File(FilePart {
            media_type: "image/png".into(),
            filename: None,
            url: "data:image/png;base64,AAAA".into(),
            provider_metadata: None,
            extra: Map::new(),
        }));
        roundtrip(Part::SourceUrl(SourceUrlPart {
            source_id: "src_1".into(),
            url: "https://venue.example.com".into(),
            title: Some("Venue site".into()),
            provider_metadata: None,
            extra: Map::new(),
        }));
        roundtrip(Part::SourceDocument(SourceDocumentPart {
            source_id: "src_2".into(),
            media_type: "text/plain".into(),
            title: "Catering menu".into(),
            filename: None,
            provider_metadata: None,
            extra: Map::new(),
        }));
        roundtrip(Part::ToolCall(ToolCallPart {
            tool_call_id: "call_1".into(),
            tool_name: "check_availability".into(),
            state: ToolState::InputAvailable,
            input: json!({ "date": "2026-06-01", "guests": 120 }),
            provider_metadata: None,
            extra: Map::new(),
        }));
        roundtrip(Part::ToolResult(ToolResultPart {
            tool_call_id: "call_1".into(),
            tool_name: "check_availability".into(),
            state: ToolState::OutputAvailable,
            input: json!({ "date": "2026-06-01" }),
            output: Some(json!({ "available": true })),
            error_text: None,
            provider_metadata: None,
            extra: Map::new(),
        }));
        roundtrip(Part::ToolResult(ToolResultPart {
            tool_call_id: "call_2".into(),
            tool_name: "quote".into(),
            state: ToolState::OutputError,
            input: json!({}),
            output: None,
            error_text: Some("vendor offline".into()),
            provider_metadata: None,
            extra: Map::new(),
        }));
        roundtrip(Part::Data(DataPart {
            data_type: "data-budget".into(),
            id: Some("b1".into()),
            data: json!({ "total": 5000 }),
            provider_metadata: Some(json!({ "source": "planner" })),
            extra: Map::new(),
        }));
        roundtrip(Part::Opaque(json!({ "type": "step-start" })));
    }

    #[test]
    fn test_only_variant_columns_populated() {
        let row = encode(&Part::text("hi"), 0);
        assert_eq!(row.part_type, "text");
        assert_eq!(row.text_value.as_deref(), Some("hi"));
        assert!(row.file_url.is_none());
        assert!(row.tool_call_id.is_none());
        assert!(row.payload.is_none());
    }

    #[test]
    fn test_wire_shape() {
        let part = Part::ToolCall(ToolCallPart {
            tool_call_id: "call_9".into(),
            tool_name: "search".into(),
            state: ToolState::InputStreaming,
            input: json!({ "q": "barn" }),
            provider_metadata: None,
            extra: Map::new(),
        });
        let value = serde_json::to_value(&part).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "tool-call",
                "toolCallId": "call_9",
                "toolName": "search",
                "state": "input-streaming",
                "input": { "q": "barn" }
            })
        );
        assert_eq!(serde_json::from_value::<Part>(value).unwrap(), part);
    }

    #[test]
    fn test_data_part_wire_shape() {
        let value = json!({ "type": "data-weather", "id": "w1", "data": { "temp": 21 } });
        let part: Part = serde_json::from_value(value.clone()).unwrap();
        match &part {
            Part::Data(data) => {
                assert_eq!(data.data_type, "data-weather");
                assert_eq!(data.id.as_deref(), Some("w1"));
            }
            other => panic!("expected data part, got {other:?}"),
        }
        assert_eq!(serde_json::to_value(&part).unwrap(), value);
    }

    #[test]
    fn test_unknown_type_kept_verbatim() {
        let value = json!({ "type": "future-widget", "payload": [1, 2, 3], "nested": { "a": null } });
        let part: Part = serde_json::from_value(value.clone()).unwrap();
        assert!(matches!(part, Part::Opaque(_)));

        let row = encode(&part, 0);
        assert_eq!(row.part_type, "future-widget");
        let decoded = decode(&row).unwrap();
        assert_eq!(serde_json::to_value(&decoded).unwrap(), value);
    }

    #[test]
    fn test_unmodelled_fields_survive_storage() {
        let wire = [
            json!({ "type": "text", "text": "hi", "state": "done" }),
            json!({
                "type": "tool-result",
                "toolCallId": "call_4",
                "toolName": "webSearch",
                "state": "output-available",
                "input": { "q": "caterers" },
                "output": { "hits": 3 },
                "providerExecuted": true
            }),
            json!({
                "type": "data-booking",
                "id": "bk_2",
                "data": { "status": "held" },
                "providerMetadata": { "crm": { "leadId": 7 } },
                "transient": false
            }),
        ];

        for value in wire {
            let part: Part = serde_json::from_value(value.clone()).unwrap();
            assert_eq!(serde_json::to_value(&part).unwrap(), value);

            let row = encode(&part, 0);
            let decoded = decode(&row).unwrap();
            assert_eq!(decoded, part);
            assert_eq!(serde_json::to_value(&decoded).unwrap(), value);
        }
    }

    #[test]
    fn test_extra_column_must_be_object() {
        let mut row = encode(&Part::text("hi"), 0);
        assert!(row.extra.is_none());

        row.extra = Some("[1, 2]".into());
        assert!(matches!(
            decode(&row),
            Err(PartDecodeError::NotAnObject { column: "extra", .. })
        ));
    }

    #[test]
    fn test_tool_state_inferred_when_not_stored() {
        let mut row = encode(
            &Part::ToolResult(ToolResultPart {
                tool_call_id: "call_1".into(),
                tool_name: "quote".into(),
                state: ToolState::OutputAvailable,
                input: json!({}),
                output: Some(json!(42)),
                error_text: None,
                provider_metadata: None,
                extra: Map::new(),
            }),
            0,
        );
        row.tool_state = None;
        match decode(&row).unwrap() {
            Part::ToolResult(result) => assert_eq!(result.state, ToolState::OutputAvailable),
            other => panic!("unexpected part {other:?}"),
        }

        row.tool_error_text = Some("boom".into());
        match decode(&row).unwrap() {
            Part::ToolResult(result) => assert_eq!(result.state, ToolState::OutputError),
            other => panic!("unexpected part {other:?}"),
        }
    }

    #[test]
    fn test_tool_state_inference_order() {
        let v = json!(1);
        assert_eq!(ToolState::infer(None, None, None), ToolState::InputStreaming);
        assert_eq!(ToolState::infer(Some(&v), None, None), ToolState::InputAvailable);
        assert_eq!(
            ToolState::infer(Some(&v), Some(&v), None),
            ToolState::OutputAvailable
        );
        assert_eq!(
            ToolState::infer(Some(&v), Some(&v), Some("err")),
            ToolState::OutputError
        );
    }

    #[test]
    fn test_decode_errors() {
        let row = PartRow {
            part_type: "file".into(),
            file_media_type: Some("image/png".into()),
            ..Default::default()
        };
        assert!(matches!(
            decode(&row),
            Err(PartDecodeError::MissingColumn {
                column: "file_url",
                ..
            })
        ));

        let row = PartRow {
            part_type: "tool-call".into(),
            tool_call_id: Some("c".into()),
            tool_name: Some("t".into()),
            tool_input: Some("{not json".into()),
            ..Default::default()
        };
        assert!(matches!(
            decode(&row),
            Err(PartDecodeError::MalformedJson {
                column: "tool_input",
                ..
            })
        ));
    }

    #[test]
    fn test_null_tool_output_is_distinct_from_absent() {
        roundtrip(Part::ToolResult(ToolResultPart {
            tool_call_id: "call_3".into(),
            tool_name: "noop".into(),
            state: ToolState::OutputAvailable,
            input: Value::Null,
            output: Some(Value::Null),
            error_text: None,
            provider_metadata: None,
            extra: Map::new(),
        }));
    }
}
