use std::{future::Future, time::Duration};

use async_trait::async_trait;
use http_cache_reqwest::{Cache, CacheMode, HttpCache, HttpCacheOptions, MokaManager};
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    multipart::{Form, Part},
    Client, Request, Response,
};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};

use super::{
    error::TransportError,
    models::{Headers, OutgoingRequest, Payload, ResponseEnvelope, SentRequest},
};

pub const DEFAULT_RETRIES: u32 = 2;

const BACKOFF_FACTOR: Duration = Duration::from_millis(500);

/// Sends one resolved request and hands back the whole exchange.
///
/// Implementations are shared between concurrent calls.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &OutgoingRequest) -> Result<ResponseEnvelope, TransportError>;
}

/// reqwest-backed transport. No timeout is configured, so a hung peer blocks
/// the awaiting call.
pub struct ReqwestTransport {
    builder: Client,
    client: ClientWithMiddleware,
    retries: u32,
}

impl ReqwestTransport {
    pub fn plain(retries: u32) -> Self {
        let builder = Client::new();
        let client = ClientBuilder::new(builder.clone()).build();
        Self {
            builder,
            client,
            retries,
        }
    }

    /// Responses are stored in memory and replayed following HTTP caching rules.
    pub fn cached(retries: u32) -> Self {
        let builder = Client::new();
        let client = ClientBuilder::new(builder.clone())
            .with(Cache(HttpCache {
                mode: CacheMode::Default,
                manager: MokaManager::default(),
                options: HttpCacheOptions::default(),
            }))
            .build();
        Self {
            builder,
            client,
            retries,
        }
    }

    fn build(&self, request: &OutgoingRequest) -> Result<Request, TransportError> {
        let mut builder = self.builder.request(request.method.clone(), &request.url);

        if let Some(params) = &request.params {
            builder = builder.query(params);
        }

        if !request.files.is_empty() {
            let mut form = Form::new();
            if let Some(Payload::Form(fields)) = &request.payload {
                for (name, value) in fields {
                    form = form.text(name.clone(), value.clone());
                }
            }
            for file in &request.files {
                let mut part = Part::bytes(file.bytes.clone()).file_name(file.file_name.clone());
                if let Some(content_type) = &file.content_type {
                    part = part.mime_str(content_type).map_err(TransportError::Build)?;
                }
                form = form.part(file.field.clone(), part);
            }
            builder = builder.multipart(form);
        } else {
            match (&request.payload, &request.json) {
                (Some(Payload::Form(fields)), _) => builder = builder.form(fields),
                (Some(Payload::Text(text)), _) => builder = builder.body(text.clone()),
                (None, Some(json)) => builder = builder.json(json),
                (None, None) => {}
            }
        }

        let mut built = builder.build().map_err(TransportError::Build)?;
        // Caller headers replace whatever the body encoder set.
        apply_headers(built.headers_mut(), &request.headers)?;
        Ok(built)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &OutgoingRequest) -> Result<ResponseEnvelope, TransportError> {
        let (sent, response) = with_retries(self.retries, move || async move {
            let built = self.build(request)?;
            let sent = sent_request(&built);
            let response = self.client.execute(built).await?;
            Ok::<_, TransportError>((sent, response))
        })
        .await?;
        read_response(sent, response).await
    }
}

/// Runs `attempt` until it succeeds, fails permanently, or `retries` extra
/// attempts are used up. Only transient errors are retried.
async fn with_retries<T, F, Fut>(retries: u32, mut attempt: F) -> Result<T, TransportError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    let mut retried = 0;
    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if retried >= retries || !err.is_transient() {
                    return Err(err);
                }
                let delay = backoff(retried);
                retried += 1;
                log::debug!("request failed ({err}); retry {retried}/{retries} in {delay:?}");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

fn apply_headers(target: &mut HeaderMap, headers: &Headers) -> Result<(), TransportError> {
    for (name, value) in headers {
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|err| TransportError::InvalidHeader {
                name: name.clone(),
                reason: err.to_string(),
            })?;
        let header_value =
            HeaderValue::from_str(value).map_err(|err| TransportError::InvalidHeader {
                name: name.clone(),
                reason: err.to_string(),
            })?;
        target.insert(header_name, header_value);
    }
    Ok(())
}

/// First retry is immediate, later ones wait 0.5s, 1s, 2s, ...
fn backoff(attempt: u32) -> Duration {
    match attempt {
        0 => Duration::ZERO,
        n => BACKOFF_FACTOR * 2u32.saturating_pow(n - 1),
    }
}

fn sent_request(request: &Request) -> SentRequest {
    SentRequest {
        method: request.method().as_str().to_string(),
        url: request.url().to_string(),
        headers: collect_headers(request.headers()),
    }
}

async fn read_response(
    request: SentRequest,
    response: Response,
) -> Result<ResponseEnvelope, TransportError> {
    let status = response.status().as_u16();
    let url = response.url().to_string();
    let headers = collect_headers(response.headers());
    let text = response.text().await.map_err(TransportError::Body)?;

    Ok(ResponseEnvelope {
        status,
        url,
        request,
        headers,
        text,
    })
}

pub(crate) fn collect_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}
