use std::sync::atomic::{AtomicU64, Ordering};

use bytes::{BufMut, Bytes, BytesMut};
use serde_json::Value;
use url::form_urlencoded;

use super::error::ProtocolError;
use super::timeouts::ClientTimeouts;
use super::{Header, Target};
use crate::utils::{
    ensure_user_agent, parse_header, parse_target, APPLICATION_JSON, CONTENT_TYPE_HEADER,
};

const APPLICATION_X_WWW_FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

#[derive(Debug, Clone)]
pub enum FormBody {
    Raw(String),
    Fields(Vec<(String, String)>),
}

impl FormBody {
    fn encode(&self) -> String {
        match self {
            FormBody::Raw(value) => value.clone(),
            FormBody::Fields(pairs) => {
                let mut serializer = form_urlencoded::Serializer::new(String::new());
                for (key, value) in pairs {
                    serializer.append_pair(key, value);
                }
                serializer.finish()
            }
        }
    }
}

impl From<&str> for FormBody {
    fn from(value: &str) -> Self {
        FormBody::Raw(value.to_string())
    }
}

impl From<String> for FormBody {
    fn from(value: String) -> Self {
        FormBody::Raw(value)
    }
}

impl<K, V> From<Vec<(K, V)>> for FormBody
where
    K: Into<String>,
    V: Into<String>,
{
    fn from(pairs: Vec<(K, V)>) -> Self {
        FormBody::Fields(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// One part of a multipart/form-data upload.
#[derive(Debug, Clone)]
pub struct MultipartPart {
    pub name: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// A multipart/form-data body. Rendering into a contiguous buffer is
/// deferred until the transport first tries to send it; the transport
/// drops the rendered buffer once the body is fully on the wire.
#[derive(Debug, Clone)]
pub struct MultipartForm {
    boundary: String,
    parts: Vec<MultipartPart>,
}

static BOUNDARY_COUNTER: AtomicU64 = AtomicU64::new(0);

impl MultipartForm {
    pub fn new() -> Self {
        let n = BOUNDARY_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self {
            boundary: format!("h2wire-boundary-{:016x}", n.wrapping_mul(0x9e37_79b9_7f4a_7c15)),
            parts: Vec::new(),
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(MultipartPart {
            name: name.into(),
            filename: None,
            content_type: None,
            data: Bytes::from(value.into().into_bytes()),
        });
        self
    }

    pub fn file(
        mut self,
        name: impl Into<String>,
        filename: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        self.parts.push(MultipartPart {
            name: name.into(),
            filename: Some(filename.into()),
            content_type: Some(content_type.into()),
            data: data.into(),
        });
        self
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Render the whole body into memory.
    pub fn render(&self) -> Bytes {
        let mut out = BytesMut::new();
        for part in &self.parts {
            out.put_slice(b"--");
            out.put_slice(self.boundary.as_bytes());
            out.put_slice(b"\r\n");
            out.put_slice(b"Content-Disposition: form-data; name=\"");
            out.put_slice(part.name.as_bytes());
            out.put_slice(b"\"");
            if let Some(filename) = &part.filename {
                out.put_slice(b"; filename=\"");
                out.put_slice(filename.as_bytes());
                out.put_slice(b"\"");
            }
            out.put_slice(b"\r\n");
            if let Some(content_type) = &part.content_type {
                out.put_slice(b"Content-Type: ");
                out.put_slice(content_type.as_bytes());
                out.put_slice(b"\r\n");
            }
            out.put_slice(b"\r\n");
            out.put_slice(&part.data);
            out.put_slice(b"\r\n");
        }
        out.put_slice(b"--");
        out.put_slice(self.boundary.as_bytes());
        out.put_slice(b"--\r\n");
        out.freeze()
    }
}

impl Default for MultipartForm {
    fn default() -> Self {
        Self::new()
    }
}

/// A request flattened for the transport: method, encoded path, regular
/// headers, body, trailers. Pseudo-header assembly happens inside the
/// transport because `:scheme` depends on the connection's TLS state.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: String,
    pub path: String,
    pub authority: Option<String>,
    pub headers: Vec<Header>,
    pub body: Option<Bytes>,
    pub multipart: Option<MultipartForm>,
    pub trailers: Vec<Header>,
}

#[derive(Debug, Clone)]
pub struct Request {
    pub target: Target,
    pub method: String,
    pub params: Vec<(String, String)>,
    pub headers: Vec<Header>,
    pub trailers: Vec<Header>,
    pub body: Option<Bytes>,
    pub json: Option<Value>,
    pub data: Option<FormBody>,
    pub multipart: Option<MultipartForm>,
    pub timeout: Option<ClientTimeouts>,
}

impl Request {
    pub fn new(target: &str, method: impl Into<String>) -> Result<Self, ProtocolError> {
        Ok(Self {
            target: parse_target(target)?,
            method: method.into(),
            params: Vec::new(),
            headers: Vec::new(),
            trailers: Vec::new(),
            body: None,
            json: None,
            data: None,
            multipart: None,
            timeout: None,
        })
    }

    pub fn get(target: &str) -> Result<Self, ProtocolError> {
        Self::new(target, "GET")
    }

    pub fn post(target: &str) -> Result<Self, ProtocolError> {
        Self::new(target, "POST")
    }

    pub fn header(mut self, header: impl AsRef<str>) -> Result<Self, ProtocolError> {
        let text = header.as_ref().trim();
        match parse_header(text) {
            Some(parsed) => {
                self.headers.push(parsed);
                Ok(self)
            }
            None => Err(ProtocolError::MalformedHeaders(format!(
                "Invalid header '{}'",
                text
            ))),
        }
    }

    pub fn header_pair(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(Header::new(name, value));
        self
    }

    pub fn trailer_pair(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.trailers.push(Header::new(name, value));
        self
    }

    pub fn body<B: Into<Bytes>>(mut self, body: B) -> Self {
        self.set_body(body);
        self
    }

    pub fn json(mut self, json: Value) -> Self {
        let serialized =
            serde_json::to_vec(&json).expect("serializing JSON body into bytes must succeed");
        self.body = Some(Bytes::from(serialized));
        self.json = Some(json);
        self.data = None;
        self.multipart = None;
        self
    }

    pub fn form<T>(mut self, data: T) -> Self
    where
        T: Into<FormBody>,
    {
        let form_body: FormBody = data.into();
        let encoded = form_body.encode();
        self.body = Some(Bytes::from(encoded.into_bytes()));
        self.data = Some(form_body);
        self.json = None;
        self.multipart = None;
        self
    }

    pub fn multipart(mut self, form: MultipartForm) -> Self {
        self.multipart = Some(form);
        self.body = None;
        self.json = None;
        self.data = None;
        self
    }

    pub fn params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.params = params
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        self
    }

    pub fn timeout(mut self, timeouts: ClientTimeouts) -> Self {
        self.timeout = Some(timeouts);
        self
    }

    pub fn set_body<B: Into<Bytes>>(&mut self, body: B) {
        self.body = Some(body.into());
        self.json = None;
        self.data = None;
        self.multipart = None;
    }

    /// Request path with the query string, extra params percent-encoded
    /// and appended to any query already on the target.
    pub fn path(&self) -> String {
        let path = self.target.path();
        let existing_query = self.target.url.query();

        if self.params.is_empty() {
            return match existing_query {
                Some(query) => format!("{}?{}", path, query),
                None => path.to_string(),
            };
        }

        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in &self.params {
            serializer.append_pair(key, value);
        }
        let appended = serializer.finish();

        match existing_query {
            Some(existing) if !appended.is_empty() => {
                format!("{}?{}&{}", path, existing, appended)
            }
            Some(existing) => format!("{}?{}", path, existing),
            None => format!("{}?{}", path, appended),
        }
    }

    fn prepare_headers(&self) -> Vec<Header> {
        let mut headers: Vec<Header> = self
            .headers
            .iter()
            .filter(|h| !h.is_pseudo())
            .cloned()
            .collect();

        if !Self::has_header(&headers, CONTENT_TYPE_HEADER) {
            if self.json.is_some() {
                headers.push(Header::new(CONTENT_TYPE_HEADER, APPLICATION_JSON));
            } else if self.data.is_some() {
                headers.push(Header::new(
                    CONTENT_TYPE_HEADER,
                    APPLICATION_X_WWW_FORM_URLENCODED,
                ));
            } else if let Some(form) = &self.multipart {
                headers.push(Header::new(CONTENT_TYPE_HEADER, form.content_type()));
            }
        }

        ensure_user_agent(&mut headers);

        headers
    }

    fn has_header(headers: &[Header], name: &str) -> bool {
        headers
            .iter()
            .any(|header| header.name.eq_ignore_ascii_case(name))
    }

    /// Flatten into the shape the transport consumes.
    pub fn prepare(&self) -> Result<PreparedRequest, ProtocolError> {
        if self.method.is_empty() {
            return Err(ProtocolError::RequestFailed(
                "request method is empty".to_string(),
            ));
        }
        Ok(PreparedRequest {
            method: self.method.clone(),
            path: self.path(),
            authority: self.target.authority(),
            headers: self.prepare_headers(),
            body: self.body.clone(),
            multipart: self.multipart.clone(),
            trailers: self.trailers.clone(),
        })
    }

    pub fn timeouts(&self, fallback: &ClientTimeouts) -> ClientTimeouts {
        self.timeout.clone().unwrap_or_else(|| fallback.clone())
    }
}
