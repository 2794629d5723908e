use crate::types::{Header, ProtocolError, Target};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use url::Url;

pub const USER_AGENT: &str = "h2wire/0.1.0";
pub const HTTP_VERSION_2_0: &str = "HTTP/2.0";
pub const HOST_HEADER: &str = "host";
pub const CONNECTION_HEADER: &str = "connection";
pub const CONTENT_LENGTH_HEADER: &str = "content-length";
pub const CONTENT_TYPE_HEADER: &str = "content-type";
pub const USER_AGENT_HEADER: &str = "user-agent";
pub const APPLICATION_JSON: &str = "application/json";

pub fn ensure_user_agent(headers: &mut Vec<Header>) {
    if !headers
        .iter()
        .any(|h| h.name.eq_ignore_ascii_case(USER_AGENT_HEADER))
    {
        headers.push(Header::new(USER_AGENT_HEADER, USER_AGENT));
    }
}

pub fn parse_target(target: &str) -> Result<Target, ProtocolError> {
    let url = Url::parse(target)
        .map_err(|e| ProtocolError::InvalidTarget(format!("{} ({})", target, e)))?;

    if url.host_str().is_none() {
        return Err(ProtocolError::InvalidTarget(format!(
            "Target '{}' is missing a host",
            target
        )));
    }

    if url.port_or_known_default().is_none() {
        return Err(ProtocolError::InvalidTarget(format!(
            "Target '{}' has no known port",
            target
        )));
    }

    Ok(Target::new(url))
}

pub fn parse_header(header: &str) -> Option<Header> {
    if let Some(stripped) = header.strip_prefix(':') {
        // Pseudo-header: split on the second colon.
        if let Some(colon_pos) = stripped.find(':') {
            let name = &header[..colon_pos + 1];
            let value = header[colon_pos + 2..].trim_start();
            Some(Header::new(name, value))
        } else {
            Some(Header::new_valueless(header))
        }
    } else if let Some((name, value)) = header.split_once(':') {
        Some(Header::new(name, value.trim_start()))
    } else {
        Some(Header::new_valueless(header))
    }
}

pub fn header_value<'a>(headers: &'a [Header], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .and_then(|h| h.value.as_deref())
}

pub async fn timeout_result<F, T>(duration: Option<Duration>, future: F) -> Result<T, ProtocolError>
where
    F: Future<Output = Result<T, ProtocolError>>,
{
    if let Some(dur) = duration {
        match timeout(dur, future).await {
            Ok(result) => result,
            Err(_) => Err(ProtocolError::Timeout),
        }
    } else {
        future.await
    }
}
