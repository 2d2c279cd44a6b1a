//! HTTP transport for the REST service.
//!
//! Commands build [`HttpRequest`] values and hand them to a [`Transport`], so
//! the dispatcher never touches sockets directly and tests can substitute a
//! local fake server or an in-memory double.

use std::fmt;
use std::io::Read;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use thiserror::Error;
use url::Url;

pub(crate) const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);
const READ_CHUNK: usize = 8 * 1024;
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Errors raised while talking to the service.
#[derive(Debug, Error)]
pub(crate) enum TransportError {
    /// The HTTP client could not be configured.
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),
    /// The request could not be sent or the response headers were invalid.
    #[error("request to {url} failed: {source}")]
    Request {
        /// Target of the failed request.
        url: String,
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },
    /// The response body could not be read.
    #[error("failed to read response from {url}: {source}")]
    Read {
        /// Target of the failed request.
        url: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Method {
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Get => "GET",
            Self::Post => "POST",
        })
    }
}

/// Media type requested from the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Accept {
    Edn,
    EventStream,
}

impl Accept {
    pub(crate) const fn media_type(self) -> &'static str {
        match self {
            Self::Edn => "application/edn",
            Self::EventStream => "text/event-stream",
        }
    }
}

/// A fully built request. Query parameters are already escaped into `url`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HttpRequest {
    pub(crate) method: Method,
    pub(crate) url: Url,
    /// Form-encoded body for `POST` requests.
    pub(crate) body: Option<String>,
    pub(crate) accept: Accept,
}

impl HttpRequest {
    pub(crate) const fn get(url: Url) -> Self {
        Self {
            method: Method::Get,
            url,
            body: None,
            accept: Accept::Edn,
        }
    }

    pub(crate) const fn post(url: Url, body: String) -> Self {
        Self {
            method: Method::Post,
            url,
            body: Some(body),
            accept: Accept::Edn,
        }
    }

    pub(crate) const fn streaming(mut self) -> Self {
        self.accept = Accept::EventStream;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HttpResponse {
    pub(crate) status: u16,
    /// The collected body; empty when it was streamed to a chunk callback.
    pub(crate) body: Vec<u8>,
}

impl HttpResponse {
    pub(crate) const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Sends requests to the service.
pub(crate) trait Transport {
    /// Performs `request`.
    ///
    /// With `on_chunk`, a successful response body is handed over chunk by
    /// chunk as it arrives instead of being collected; error bodies are
    /// always collected.
    fn perform(
        &self,
        request: &HttpRequest,
        on_chunk: Option<&mut dyn FnMut(&[u8])>,
    ) -> Result<HttpResponse, TransportError>;
}

/// [`Transport`] backed by a blocking `reqwest` client.
#[derive(Debug, Clone)]
pub(crate) struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Builds a client with a connect timeout and no overall timeout, so the
    /// event stream can stay open indefinitely.
    pub(crate) fn new() -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(CONNECTION_TIMEOUT)
            .timeout(None::<Duration>)
            .build()
            .map_err(TransportError::Client)?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn perform(
        &self,
        request: &HttpRequest,
        on_chunk: Option<&mut dyn FnMut(&[u8])>,
    ) -> Result<HttpResponse, TransportError> {
        let url = request.url.as_str();
        let builder = match request.method {
            Method::Get => self.client.get(url),
            Method::Post => self
                .client
                .post(url)
                .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
                .body(request.body.clone().unwrap_or_default()),
        };
        let mut response = builder
            .header(ACCEPT, request.accept.media_type())
            .send()
            .map_err(|source| TransportError::Request {
                url: url.to_owned(),
                source,
            })?;
        let status = response.status().as_u16();
        tracing::debug!(method = %request.method, url, status, "received response");

        let read_error = |source: std::io::Error| TransportError::Read {
            url: url.to_owned(),
            source,
        };
        match on_chunk {
            Some(callback) if response.status().is_success() => {
                let mut buffer = vec![0_u8; READ_CHUNK];
                loop {
                    let read = response.read(&mut buffer).map_err(&read_error)?;
                    if read == 0 {
                        break;
                    }
                    callback(buffer.get(..read).unwrap_or_default());
                }
                Ok(HttpResponse {
                    status,
                    body: Vec::new(),
                })
            }
            _ => {
                let mut body = Vec::new();
                response.read_to_end(&mut body).map_err(&read_error)?;
                tracing::debug!(url, bytes = body.len(), "collected response body");
                Ok(HttpResponse { status, body })
            }
        }
    }
}
