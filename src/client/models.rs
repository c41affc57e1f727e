use std::{collections::BTreeMap, path::Path};

use reqwest::Method;
use serde_json::{Map, Value};

use super::error::HelperError;

pub type Headers = BTreeMap<String, String>;

/// Selects the transport a single call goes through.
///
/// `Unspecified` is the default and is rejected at dispatch time, so every
/// call has to choose explicitly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CacheDirective {
    #[default]
    Unspecified,
    Cached,
    Fresh,
}

/// Version segment inserted between the host and the endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ApiVersion {
    #[default]
    None,
    V1,
    V2,
    Custom(String),
}

impl ApiVersion {
    pub fn segment(&self) -> &str {
        match self {
            ApiVersion::None => "",
            ApiVersion::V1 => "/v1",
            ApiVersion::V2 => "/v2",
            ApiVersion::Custom(segment) => segment,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Form(BTreeMap<String, String>),
    Text(String),
}

impl Payload {
    pub fn form<K, V>(fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Payload::Form(
            fields
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }

    fn to_log_value(&self) -> Value {
        match self {
            Payload::Form(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(key, value)| (key.clone(), Value::String(value.clone())))
                    .collect(),
            ),
            Payload::Text(text) => Value::String(text.clone()),
        }
    }
}

/// A file sent as one multipart field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAttachment {
    pub field: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl FileAttachment {
    pub fn from_bytes(
        field: impl Into<String>,
        file_name: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            field: field.into(),
            file_name: file_name.into(),
            content_type: None,
            bytes: bytes.into(),
        }
    }

    pub async fn from_path(field: impl Into<String>, path: &Path) -> Result<Self, HelperError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| HelperError::Attachment {
                path: path.to_path_buf(),
                source,
            })?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self::from_bytes(field, file_name, bytes))
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Everything one verb call carries; built up by [`super::Call`].
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    pub endpoint: String,
    pub version: Option<ApiVersion>,
    pub payload: Option<Payload>,
    pub json: Option<Value>,
    pub files: Vec<FileAttachment>,
    pub headers: Option<Headers>,
    pub params: Option<Vec<(String, String)>>,
    pub expected_status: Option<u16>,
    pub token: Option<String>,
    pub cache: CacheDirective,
}

impl RequestDescriptor {
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            version: None,
            payload: None,
            json: None,
            files: Vec::new(),
            headers: None,
            params: None,
            expected_status: Some(200),
            token: None,
            cache: CacheDirective::Unspecified,
        }
    }
}

/// A fully resolved request as handed to a transport.
#[derive(Debug, Clone)]
pub struct OutgoingRequest {
    pub method: Method,
    pub url: String,
    pub headers: Headers,
    pub payload: Option<Payload>,
    pub json: Option<Value>,
    pub files: Vec<FileAttachment>,
    pub params: Option<Vec<(String, String)>>,
}

impl OutgoingRequest {
    /// The `data` / `json` / `files` / `params` record written to the log.
    pub fn body_record(&self) -> Map<String, Value> {
        let mut record = Map::new();
        record.insert(
            "data".to_string(),
            self.payload
                .as_ref()
                .map(Payload::to_log_value)
                .unwrap_or(Value::Null),
        );
        record.insert("json".to_string(), self.json.clone().unwrap_or(Value::Null));
        let files = if self.files.is_empty() {
            Value::Null
        } else {
            Value::Object(
                self.files
                    .iter()
                    .map(|file| (file.field.clone(), Value::String(file.file_name.clone())))
                    .collect(),
            )
        };
        record.insert("files".to_string(), files);
        let params = self
            .params
            .as_ref()
            .map(|pairs| {
                Value::Object(
                    pairs
                        .iter()
                        .map(|(key, value)| (key.clone(), Value::String(value.clone())))
                        .collect(),
                )
            })
            .unwrap_or(Value::Null);
        record.insert("params".to_string(), params);
        record
    }
}

/// The request as it actually went out, including encoder-added headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseEnvelope {
    pub status: u16,
    pub url: String,
    pub request: SentRequest,
    pub headers: Vec<(String, String)>,
    pub text: String,
}

impl ResponseEnvelope {
    /// Case-insensitive header lookup; the first match wins.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn is_json(&self) -> bool {
        self.header("Content-Type")
            .unwrap_or("")
            .starts_with("application/json")
    }

    pub fn json(&self) -> serde_json::Result<Value> {
        serde_json::from_str(&self.text)
    }
}

/// Decoded body returned to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
}

impl ResponseBody {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseBody::Json(value) => Some(value),
            ResponseBody::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResponseBody::Json(_) => None,
            ResponseBody::Text(text) => Some(text),
        }
    }

    pub fn into_json(self) -> Option<Value> {
        match self {
            ResponseBody::Json(value) => Some(value),
            ResponseBody::Text(_) => None,
        }
    }
}
