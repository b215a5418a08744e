//! HTTP/1.1 request serialization
//!
//! Produces the raw bytes the generator writes to the socket, with
//! placeholders left intact for runtime substitution.

use crate::vars;
use loadwire_core::{Body, Error, Fields, RequestSpec, Result, Scenario};
use url::form_urlencoded;
use url::Url;

/// Marker the generator replaces with the final body length after substitution
pub const CONTENT_LENGTH_PLACEHOLDER: &str = "${:content-length:}";

/// Where a request goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// `scheme://host[:port]`
    pub address: String,
    /// `host[:port]`, used for the `Host` header
    pub authority: String,
    /// Path plus query string
    pub path: String,
}

/// Ordered header list where a later value replaces an earlier one of the same name
#[derive(Debug, Default)]
struct HeaderList(Vec<(String, String)>);

impl HeaderList {
    fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self
            .0
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
        {
            Some(entry) => *entry = (name.to_string(), value),
            None => self.0.push((name.to_string(), value)),
        }
    }
}

/// Split `scheme://authority` from the rest without normalizing either part
///
/// Paths are kept verbatim so `${var}` placeholders survive.
fn split_origin(raw: &str) -> Option<(&str, &str, &str)> {
    let sep = raw.find("://")?;
    let after = sep + 3;
    let end = raw[after..]
        .find(['/', '?', '#'])
        .map_or(raw.len(), |pos| after + pos);
    Some((&raw[..sep], &raw[after..end], &raw[end..]))
}

fn origin_of(raw: &str) -> Result<Option<(String, String)>> {
    let Some((scheme, authority, _)) = split_origin(raw) else {
        return Ok(None);
    };
    if authority.is_empty() {
        return Ok(None);
    }

    // Templated hosts are only resolvable by the generator.
    if !vars::has_placeholders(authority) {
        Url::parse(&format!("{scheme}://{authority}"))
            .map_err(|e| Error::config(format!("invalid address '{raw}': {e}")))?;
    }
    Ok(Some((scheme.to_ascii_lowercase(), authority.to_string())))
}

fn urlencode(fields: &Fields) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(fields.iter())
        .finish()
}

/// Resolve address and path for a request
///
/// A URL without a host borrows scheme and authority from the scenario's
/// default address. For GET requests a form body goes into the query string.
pub fn resolve_target(request: &RequestSpec, default_address: Option<&str>) -> Result<Target> {
    let rest = split_origin(&request.url).map_or(request.url.as_str(), |(_, _, rest)| rest);

    let (scheme, authority) = match origin_of(&request.url)? {
        Some(origin) => origin,
        None => default_address
            .map(origin_of)
            .transpose()?
            .flatten()
            .ok_or_else(|| {
                Error::config(format!(
                    "cannot determine target address for '{}': no host in URL and no default-address",
                    request.url
                ))
            })?,
    };

    let rest = rest.split_once('#').map_or(rest, |(before, _)| before);
    let (path, query) = match rest.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (rest, None),
    };

    let mut path = if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    };

    match (query, &request.body) {
        (Some(query), _) if !query.is_empty() => {
            path.push('?');
            path.push_str(query);
        }
        (_, Some(Body::Form(fields))) if request.method == "GET" && !fields.is_empty() => {
            path.push('?');
            path.push_str(&urlencode(fields));
        }
        _ => {}
    }

    Ok(Target {
        address: format!("{scheme}://{authority}"),
        authority,
        path,
    })
}

/// Serialize a request into its target and raw HTTP/1.1 text
///
/// Header precedence, lowest first: `Host`, `Connection`, `Content-Length`,
/// scenario headers, request headers.
pub fn build_request(request: &RequestSpec, scenario: &Scenario) -> Result<(Target, String)> {
    let target = resolve_target(request, scenario.default_address.as_deref())?;

    let body = match &request.body {
        Some(Body::Text(text)) => text.clone(),
        Some(Body::Form(fields)) if request.method != "GET" => urlencode(fields),
        Some(Body::Form(_)) | None => String::new(),
    };

    let mut headers = HeaderList::default();
    headers.set("Host", target.authority.clone());
    if !scenario.keepalive {
        headers.set("Connection", "close");
    }
    if !body.is_empty() {
        if vars::has_placeholders(&body) {
            headers.set("Content-Length", CONTENT_LENGTH_PLACEHOLDER);
        } else {
            headers.set("Content-Length", body.len().to_string());
        }
    }
    for (name, value) in scenario.headers.iter().chain(request.headers.iter()) {
        headers.set(name, value);
    }

    let mut payload = format!("{} {} HTTP/1.1\r\n", request.method, target.path);
    for (name, value) in &headers.0 {
        payload.push_str(name);
        payload.push_str(": ");
        payload.push_str(value);
        payload.push_str("\r\n");
    }
    payload.push_str("\r\n");
    payload.push_str(&body);

    Ok((target, payload))
}
