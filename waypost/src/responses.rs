use hyper::header::HeaderValue;

use crate::prelude::*;

/// Shortcuts for generating [`Response`]s
pub mod respond {

    use super::*;

    /// Shortcut for Response::Empty(Status::OK)
    pub fn ok() -> Response {
        Response::Empty(Status::OK)
    }

    pub fn error() -> Response {
        Response::Empty(Status::INTERNAL_SERVER_ERROR)
    }

    /// 405, with an `Allow` header listing the methods actually registered
    /// at the matched path (always includes `OPTIONS`).
    pub fn method_not_allowed(allowed: &str) -> Response {
        allow_response(Status::METHOD_NOT_ALLOWED, allowed)
    }

    pub fn not_found() -> Response {
        Response::Empty(Status::NOT_FOUND)
    }

    pub fn forbidden() -> Response {
        Response::Empty(Status::FORBIDDEN)
    }

    #[derive(serde::Serialize)]
    struct MultipleChoices {
        message: &'static str,
        options: Vec<String>,
    }
    pub fn multiple_choices(choices: &[String]) -> Result<Response, ResponseError> {
        json(
            Status::MULTIPLE_CHOICES,
            &MultipleChoices {
                message: "Multiple choices were found for the request target",
                options: choices.to_vec(),
            },
        )
    }

    pub fn payload_too_large(max_bytes: usize) -> Response {
        let mut resp = HttpResponse::new(HttpBody::from(format!(
            "Payload too large. Expected at most {} bytes",
            max_bytes
        )));
        *resp.status_mut() = Status::PAYLOAD_TOO_LARGE;
        Response::Custom(resp)
    }

    pub fn status(status: Status) -> Response {
        Response::Empty(status)
    }

    pub fn json<T: serde::Serialize>(status: Status, body: &T) -> Result<Response, ResponseError> {
        let json = serde_json::to_string(body).map_err(ResponseError::SerializeJson)?;
        if json.is_empty() {
            Ok(Response::Empty(status))
        } else {
            Ok(Response::Json(status, json))
        }
    }

    pub fn html(status: Status, body: impl Into<String>) -> Response {
        let body = body.into();
        if body.is_empty() {
            Response::Empty(status)
        } else {
            Response::Html(status, body)
        }
    }

    pub fn redirect(status: Status, location: &str) -> Result<Response, ResponseError> {
        let location = HeaderValue::from_str(location).map_err(ResponseError::ToHeaderValue)?;
        Ok(Response::Redirect { status, location })
    }

    pub fn no_content() -> Response {
        Response::Empty(Status::NO_CONTENT)
    }

    pub fn xml(status: Status, body: impl Into<String>) -> Response {
        let body = body.into();
        if body.is_empty() {
            Response::Empty(status)
        } else {
            Response::Xml(status, body)
        }
    }

    // &[u8] instead? But how to stop from copying?
    pub fn bytes(status: Status, body: Vec<u8>, calculate_md5: bool) -> Result<Response, ResponseError> {
        if body.is_empty() {
            Ok(Response::Empty(status))
        } else {
            let md5 = if calculate_md5 {
                let hash = md5::compute(&body);
                Some(base64::encode_config(hash.as_ref(), base64::STANDARD))
            } else {
                None
            };
            Ok(Response::Bytes { status, body, md5 })
        }
    }

    pub fn unauthorized() -> Response {
        let mut resp = HttpResponse::new(HttpBody::empty());
        *resp.status_mut() = Status::UNAUTHORIZED;
        resp.headers_mut().insert(hyper::header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        Response::Custom(resp)
    }

    /// Respond to a non-CORS OPTIONS request with 204 and an `Allow`
    /// header listing every method registered at the matched path.
    pub(crate) fn options(allowed: &str) -> Response {
        allow_response(Status::NO_CONTENT, allowed)
    }

    fn allow_response(status: Status, allowed: &str) -> Response {
        let allow_methods = if allowed.is_empty() {
            "OPTIONS".to_string()
        } else {
            format!("OPTIONS, {}", allowed)
        };

        let allow_header = HeaderValue::from_str(&allow_methods).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to encode Allow header value");
            HeaderValue::from_static("OPTIONS")
        });

        let mut resp = HttpResponse::new(HttpBody::empty());
        *resp.status_mut() = status;
        resp.headers_mut().insert(hyper::header::ALLOW, allow_header);

        Response::Custom(resp)
    }
}

pub enum Response {
    Empty(Status),
    Text(Status, String),
    Html(Status, String),
    Xml(Status, String),
    Bytes {
        status: Status,
        body: Vec<u8>,
        md5: Option<String>,
    },
    Json(Status, String),
    Redirect {
        status: Status,
        location: HeaderValue,
    },
    Custom(HttpResponse),
}

impl Response {
    pub fn status(&self) -> Status {
        match self {
            Response::Empty(ref s) => *s,
            Response::Text(ref s, _) => *s,
            Response::Html(ref s, _) => *s,
            Response::Xml(ref s, _) => *s,
            Response::Bytes { status, .. } => *status,
            Response::Json(ref s, _) => *s,
            Response::Redirect { status, .. } => *status,
            Response::Custom(http) => http.status(),
        }
    }
}

#[derive(Debug)]
pub enum ResponseError {
    SerializeJson(serde_json::Error),
    ToHeaderValue(hyper::header::InvalidHeaderValue),
}

impl std::fmt::Display for ResponseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseError::SerializeJson(ref e) => write!(f, "Failed to serialize json body: {}", e),
            ResponseError::ToHeaderValue(ref e) => write!(f, "Failed to serialize header value: {}", e),
        }
    }
}

impl std::error::Error for ResponseError {}

const CONTENT_TYPE_TEXT: &str = "text/plain";
const CONTENT_TYPE_HTML: &str = "text/html";
const CONTENT_TYPE_XML: &str = "application/xml";
const CONTENT_TYPE_BYTES: &str = "application/octet-stream";
const CONTENT_TYPE_JSON: &str = "application/json";

impl From<Response> for HttpResponse {
    fn from(value: Response) -> Self {
        match value {
            Response::Empty(status) => hyper::Response::builder().status(status).body(hyper::Body::empty()),

            Response::Text(status, text) => hyper::Response::builder()
                .status(status)
                .header(hyper::header::CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_TEXT))
                .body(hyper::Body::from(text)),

            Response::Html(status, html) => hyper::Response::builder()
                .status(status)
                .header(hyper::header::CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_HTML))
                .body(hyper::Body::from(html)),

            Response::Xml(status, xml) => hyper::Response::builder()
                .status(status)
                .header(hyper::header::CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_XML))
                .body(hyper::Body::from(xml)),

            Response::Bytes { status, body, md5 } => {
                let mut builder = hyper::Response::builder()
                    .status(status)
                    .header(hyper::header::CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_BYTES))
                    .header(hyper::header::CONTENT_LENGTH, body.len());

                if let Some(md5) = md5 {
                    match hyper::header::HeaderValue::from_str(&md5) {
                        Ok(md5) => {
                            builder = builder.header(hyper::header::HeaderName::from_static("content-md5"), md5);
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to serialize byte response md5: {}", md5);
                        }
                    }
                }

                builder.body(hyper::Body::from(body))
            }
            Response::Json(status, json) => hyper::Response::builder()
                .status(status)
                .header(hyper::header::CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_JSON))
                .body(hyper::Body::from(json)),

            Response::Redirect { status, location } => hyper::Response::builder()
                .status(status)
                .header(hyper::header::LOCATION, location)
                .body(hyper::Body::empty()),

            Response::Custom(resp) => Ok(resp),
        }
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to convert response to http");
            HttpResponse::from(Response::Empty(Status::INTERNAL_SERVER_ERROR))
        })
    }
}
