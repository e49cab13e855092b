//! Network and navigation collaborators.
//!
//! [`HttpClient`] covers the two requests the runtime makes: a JSON GET for
//! remote sources and a JSON body request for submits. [`ReqwestClient`] is
//! the production implementation.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

use reqwest::Url;
use serde_json::Value;
use tracing::debug;

use crate::error::NetworkError;

/// Boxed response future. Not `Send`; runs on a `LocalSet`.
pub type HttpFuture<'a> = Pin<Box<dyn Future<Output = Result<Value, NetworkError>> + 'a>>;

pub trait HttpClient {
    /// `GET url`, decoding the body as JSON.
    fn fetch<'a>(&'a self, url: &'a str) -> HttpFuture<'a>;

    /// Send `body` as JSON with `method`, decoding the response as JSON.
    fn send<'a>(&'a self, method: Method, url: &'a str, body: &'a Value) -> HttpFuture<'a>;
}

pub trait Navigator {
    fn navigate(&self, target: &str);
}

// ---------------------------------------------------------------------------
// Method
// ---------------------------------------------------------------------------

/// Submit method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    #[default]
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            other => Err(other.to_string()),
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

// ---------------------------------------------------------------------------
// ReqwestClient
// ---------------------------------------------------------------------------

/// [`HttpClient`] over `reqwest`. Relative URLs resolve against the base URL.
#[derive(Debug, Clone, Default)]
pub struct ReqwestClient {
    client: reqwest::Client,
    base_url: Option<Url>,
}

impl ReqwestClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    fn resolve(&self, url: &str) -> Result<Url, NetworkError> {
        let parsed = match &self.base_url {
            Some(base) => base.join(url),
            None => Url::parse(url),
        };
        parsed.map_err(|err| NetworkError::Request {
            url: url.to_string(),
            message: err.to_string(),
        })
    }

    async fn finish(url: &str, response: reqwest::Response) -> Result<Value, NetworkError> {
        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = response.bytes().await.map_err(|err| NetworkError::Decode {
            url: url.to_string(),
            message: err.to_string(),
        })?;
        Ok(decode_body(url, &body))
    }
}

fn request_error(url: &str, err: reqwest::Error) -> NetworkError {
    NetworkError::Request {
        url: url.to_string(),
        message: err.to_string(),
    }
}

/// Success bodies that are empty or not JSON decode to `null`.
pub(crate) fn decode_body(url: &str, body: &[u8]) -> Value {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }
    serde_json::from_slice(body).unwrap_or_else(|err| {
        debug!(%url, %err, "non-JSON response body treated as null");
        Value::Null
    })
}

impl HttpClient for ReqwestClient {
    fn fetch<'a>(&'a self, url: &'a str) -> HttpFuture<'a> {
        Box::pin(async move {
            let target = self.resolve(url)?;
            debug!(%target, "GET");
            let response = self
                .client
                .get(target)
                .header(reqwest::header::ACCEPT, "application/json")
                .send()
                .await
                .map_err(|err| request_error(url, err))?;
            Self::finish(url, response).await
        })
    }

    fn send<'a>(&'a self, method: Method, url: &'a str, body: &'a Value) -> HttpFuture<'a> {
        Box::pin(async move {
            let target = self.resolve(url)?;
            debug!(%method, %target, "send");
            let response = self
                .client
                .request(method.into(), target)
                .json(body)
                .send()
                .await
                .map_err(|err| request_error(url, err))?;
            Self::finish(url, response).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn method_parse_and_display() {
        assert_eq!("post".parse::<Method>(), Ok(Method::Post));
        assert_eq!(" Patch".parse::<Method>(), Ok(Method::Patch));
        assert!("TRACE".parse::<Method>().is_err());
        assert_eq!(Method::default(), Method::Post);
        assert_eq!(Method::Delete.to_string(), "DELETE");
        assert_eq!(reqwest::Method::from(Method::Put), reqwest::Method::PUT);
    }

    #[test]
    fn resolve_against_base() {
        let client = ReqwestClient::new().with_base_url(Url::parse("https://app.test/ui/").unwrap());
        assert_eq!(
            client.resolve("/api/users").unwrap().as_str(),
            "https://app.test/api/users"
        );
        assert_eq!(
            client.resolve("data.json").unwrap().as_str(),
            "https://app.test/ui/data.json"
        );
    }

    #[test]
    fn relative_url_without_base_is_a_request_error() {
        let err = ReqwestClient::new().resolve("/api/users").unwrap_err();
        assert!(matches!(err, NetworkError::Request { ref url, .. } if url == "/api/users"));
    }

    #[test]
    fn body_decoding() {
        assert_eq!(decode_body("u", b""), Value::Null);
        assert_eq!(decode_body("u", b"  \n"), Value::Null);
        assert_eq!(decode_body("u", b"<html>"), Value::Null);
        assert_eq!(decode_body("u", br#"{"ok":true}"#), json!({"ok": true}));
    }

    #[tokio::test]
    async fn fetch_of_invalid_url_fails_before_sending() {
        let client = ReqwestClient::new();
        let err = client.fetch("not a url").await.unwrap_err();
        assert!(matches!(err, NetworkError::Request { .. }));
    }
}
