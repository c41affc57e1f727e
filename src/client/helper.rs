use std::{marker::PhantomData, sync::Arc};

use reqwest::Method;
use serde_json::Value;

use crate::config::Settings;

use super::{
    error::HelperError,
    models::{
        ApiVersion, CacheDirective, FileAttachment, Headers, OutgoingRequest, Payload,
        RequestDescriptor, ResponseBody, ResponseEnvelope,
    },
    printer::describe_exchange,
    transport::{ReqwestTransport, Transport, DEFAULT_RETRIES},
};

/// Verb markers for [`Call`]. They decide which builder methods exist.
pub mod verb {
    #[derive(Debug)]
    pub struct Get;
    #[derive(Debug)]
    pub struct Post;
    #[derive(Debug)]
    pub struct Put;
    #[derive(Debug)]
    pub struct Patch;
    #[derive(Debug)]
    pub struct Delete;

    /// Verbs that accept an API version override.
    pub trait Versioned {}
    /// Verbs that accept a JSON body.
    pub trait JsonBody {}
    /// Verbs that accept file attachments.
    pub trait Attachments {}

    impl Versioned for Get {}
    impl Versioned for Post {}
    impl Versioned for Patch {}
    impl Versioned for Delete {}

    impl JsonBody for Post {}
    impl JsonBody for Put {}
    impl JsonBody for Patch {}
    impl JsonBody for Delete {}

    impl Attachments for Post {}
}

/// Calls a remote API on behalf of a test: builds the URL, attaches headers,
/// logs a masked record of the exchange and checks the status code.
///
/// Cheap to share; concurrent calls only share the two transports.
#[derive(Clone)]
pub struct RequestHelper {
    base_url: String,
    version: ApiVersion,
    plain: Arc<dyn Transport>,
    cached: Arc<dyn Transport>,
}

impl RequestHelper {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_transports(
            base_url,
            Arc::new(ReqwestTransport::plain(DEFAULT_RETRIES)),
            Arc::new(ReqwestTransport::cached(DEFAULT_RETRIES)),
        )
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.api_host.clone())
    }

    pub fn with_transports(
        base_url: impl Into<String>,
        plain: Arc<dyn Transport>,
        cached: Arc<dyn Transport>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            version: ApiVersion::None,
            plain,
            cached,
        }
    }

    pub fn with_version(mut self, version: ApiVersion) -> Self {
        self.version = version;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Plain concatenation; duplicate or missing slashes are kept as given.
    pub fn url(&self, endpoint: &str, version: Option<&ApiVersion>) -> String {
        let version = version.unwrap_or(&self.version);
        format!("{}{}{}", self.base_url, version.segment(), endpoint)
    }

    pub fn default_headers(token: Option<&str>) -> Headers {
        let mut headers = Headers::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        if let Some(token) = token.filter(|token| !token.is_empty()) {
            headers.insert("Authorization".to_string(), format!("Token {token}"));
        }
        headers
    }

    pub fn get(&self, endpoint: impl Into<String>) -> Call<'_, verb::Get> {
        Call::new(self, Method::GET, endpoint)
    }

    pub fn post(&self, endpoint: impl Into<String>) -> Call<'_, verb::Post> {
        Call::new(self, Method::POST, endpoint)
    }

    /// Always targets the helper's default version; there is no override.
    ///
    /// ```compile_fail
    /// # use apirig::client::{ApiVersion, RequestHelper};
    /// # fn demo(helper: &RequestHelper) {
    /// let _ = helper.put("/x").version(ApiVersion::V1);
    /// # }
    /// ```
    pub fn put(&self, endpoint: impl Into<String>) -> Call<'_, verb::Put> {
        Call::new(self, Method::PUT, endpoint)
    }

    pub fn patch(&self, endpoint: impl Into<String>) -> Call<'_, verb::Patch> {
        Call::new(self, Method::PATCH, endpoint)
    }

    pub fn delete(&self, endpoint: impl Into<String>) -> Call<'_, verb::Delete> {
        Call::new(self, Method::DELETE, endpoint)
    }

    pub async fn execute(&self, descriptor: RequestDescriptor) -> Result<ResponseBody, HelperError> {
        let url = self.url(&descriptor.endpoint, descriptor.version.as_ref());
        let headers = match descriptor.headers {
            Some(headers) if !headers.is_empty() => headers,
            _ => Self::default_headers(descriptor.token.as_deref()),
        };

        let (transport, note) = match descriptor.cache {
            CacheDirective::Cached => (&self.cached, "cache Stored"),
            CacheDirective::Fresh => (&self.plain, "cache reused"),
            CacheDirective::Unspecified => return Err(HelperError::MissingCacheDirective),
        };

        let request = OutgoingRequest {
            method: descriptor.method,
            url,
            headers,
            payload: descriptor.payload,
            json: descriptor.json,
            files: descriptor.files,
            params: descriptor.params,
        };

        let response = transport.send(&request).await?;
        log::info!("{note}");
        log::info!("{}", describe_exchange(&response, &request.body_record()));

        assert_status(&response, descriptor.expected_status)?;
        extract_body(&response)
    }
}

fn assert_status(response: &ResponseEnvelope, expected: Option<u16>) -> Result<(), HelperError> {
    match expected {
        Some(expected) if expected != response.status => Err(HelperError::UnexpectedStatus {
            expected,
            actual: response.status,
            url: response.url.clone(),
        }),
        _ => Ok(()),
    }
}

fn extract_body(response: &ResponseEnvelope) -> Result<ResponseBody, HelperError> {
    if response.is_json() {
        let value = response.json().map_err(|source| HelperError::Decode {
            url: response.url.clone(),
            source,
        })?;
        Ok(ResponseBody::Json(value))
    } else {
        Ok(ResponseBody::Text(response.text.clone()))
    }
}

/// One pending request. Nothing is sent until [`Call::send`] is awaited.
#[must_use = "a call does nothing until `send` is awaited"]
pub struct Call<'a, V> {
    helper: &'a RequestHelper,
    descriptor: RequestDescriptor,
    verb: PhantomData<V>,
}

impl<'a, V> Call<'a, V> {
    fn new(helper: &'a RequestHelper, method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            helper,
            descriptor: RequestDescriptor::new(method, endpoint),
            verb: PhantomData,
        }
    }

    pub fn payload(mut self, payload: Payload) -> Self {
        self.descriptor.payload = Some(payload);
        self
    }

    pub fn form<K, F>(self, fields: impl IntoIterator<Item = (K, F)>) -> Self
    where
        K: Into<String>,
        F: Into<String>,
    {
        self.payload(Payload::form(fields))
    }

    /// Replaces the default `Content-Type` / `Authorization` headers entirely.
    pub fn headers(mut self, headers: Headers) -> Self {
        self.descriptor.headers = Some(headers);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.descriptor
            .headers
            .get_or_insert_with(Headers::new)
            .insert(name.into(), value.into());
        self
    }

    pub fn params<K, P>(mut self, params: impl IntoIterator<Item = (K, P)>) -> Self
    where
        K: Into<String>,
        P: Into<String>,
    {
        self.descriptor
            .params
            .get_or_insert_with(Vec::new)
            .extend(params.into_iter().map(|(key, value)| (key.into(), value.into())));
        self
    }

    pub fn param(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params([(key.into(), value.into())])
    }

    pub fn expect_status(mut self, status: u16) -> Self {
        self.descriptor.expected_status = Some(status);
        self
    }

    pub fn no_status_check(mut self) -> Self {
        self.descriptor.expected_status = None;
        self
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.descriptor.token = Some(token.into());
        self
    }

    pub fn cache(mut self, directive: CacheDirective) -> Self {
        self.descriptor.cache = directive;
        self
    }

    pub fn cached(self) -> Self {
        self.cache(CacheDirective::Cached)
    }

    pub fn fresh(self) -> Self {
        self.cache(CacheDirective::Fresh)
    }

    pub fn descriptor(&self) -> &RequestDescriptor {
        &self.descriptor
    }

    pub async fn send(self) -> Result<ResponseBody, HelperError> {
        self.helper.execute(self.descriptor).await
    }
}

impl<V: verb::Versioned> Call<'_, V> {
    pub fn version(mut self, version: ApiVersion) -> Self {
        self.descriptor.version = Some(version);
        self
    }
}

impl<V: verb::JsonBody> Call<'_, V> {
    pub fn json(mut self, body: Value) -> Self {
        self.descriptor.json = Some(body);
        self
    }
}

impl<V: verb::Attachments> Call<'_, V> {
    /// Sends the request as multipart. With the default headers the
    /// `Content-Type: application/json` header still replaces the multipart
    /// one, so uploads normally pass explicit [`Call::headers`].
    pub fn file(mut self, file: FileAttachment) -> Self {
        self.descriptor.files.push(file);
        self
    }
}
