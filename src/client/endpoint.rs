use crate::config::{Connection, Scheme};
use crate::prelude::{Error, Result};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use url::Url;

/// Characters of an ext_id that are percent-encoded in a URL path: everything
/// except the RFC 3986 unreserved set.
const EXT_ID_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Product surface of the Nutanix control plane. Each surface is a distinct
/// base path with its own default scheme and port.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    /// v3 intent API, `/api/nutanix/v3`.
    Intent,
    /// v4 typed API, `/api/<namespace>/<version>`.
    Typed {
        namespace: &'static str,
        version: &'static str,
    },
    Foundation,
    FoundationCentral,
    Karbon,
    KarbonBeta,
    Era,
}

impl Surface {
    pub const PRISM: Surface = Surface::Typed {
        namespace: "prism",
        version: "v4.0",
    };
    pub const NETWORKING: Surface = Surface::Typed {
        namespace: "networking",
        version: "v4.0",
    };
    pub const VOLUMES: Surface = Surface::Typed {
        namespace: "volumes",
        version: "v4.0",
    };
    pub const FILES: Surface = Surface::Typed {
        namespace: "files",
        version: "v4.0.a2",
    };

    pub fn base_path(&self) -> String {
        match self {
            Surface::Intent => "/api/nutanix/v3".to_owned(),
            Surface::Typed { namespace, version } => format!("/api/{}/{}", namespace, version),
            Surface::Foundation => "/foundation".to_owned(),
            Surface::FoundationCentral => "/api/fc/v1".to_owned(),
            Surface::Karbon => "/karbon/v1/k8s".to_owned(),
            Surface::KarbonBeta => "/karbon/v1-beta.1/k8s".to_owned(),
            Surface::Era => "/era".to_owned(),
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Surface::Foundation => 8000,
            Surface::Era => 443,
            _ => 9440,
        }
    }

    pub fn default_scheme(&self) -> Scheme {
        match self {
            Surface::Foundation => Scheme::Http,
            _ => Scheme::Https,
        }
    }
}

impl Display for Surface {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.base_path())
    }
}

// -----------------------------------------------------------------------------

/// Descriptor of one endpoint on a product surface.
///
/// # Fields
///
/// * `surface`: Product surface providing the base path.
/// * `resource`: Resource path such as `/vms`, optionally carrying its own
///   query string.
/// * `ext_id`: Entity identifier, percent-encoded when built.
/// * `sub`: Sub-endpoint such as `/list` or `/file`, appended unescaped.
/// * `query`: Query parameters merged with the resource path's own query.
///
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    pub surface: Surface,
    pub resource: String,
    pub ext_id: Option<String>,
    pub sub: Option<String>,
    pub query: BTreeMap<String, String>,
}

impl Endpoint {
    pub fn new(surface: Surface, resource: &str) -> Self {
        Self {
            surface,
            resource: resource.to_owned(),
            ext_id: None,
            sub: None,
            query: BTreeMap::new(),
        }
    }

    pub fn ext_id(mut self, ext_id: &str) -> Self {
        self.ext_id = Some(ext_id.to_owned());
        self
    }

    pub fn sub(mut self, sub: &str) -> Self {
        self.sub = Some(sub.to_owned());
        self
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.insert(key.to_owned(), value.to_string());
        self
    }

    /// Expected URL path of the endpoint, without query.
    ///
    pub fn path(&self) -> String {
        let resource = self
            .resource
            .split_once('?')
            .map_or(self.resource.as_str(), |(path, _)| path);
        let mut path = self.surface.base_path() + resource;
        if let Some(ext_id) = &self.ext_id {
            path.push('/');
            path.push_str(&utf8_percent_encode(ext_id, EXT_ID_ENCODE_SET).to_string());
        }
        if let Some(sub) = &self.sub {
            path.push_str(sub);
        }
        path
    }

    /// Builds and validates the URL of the endpoint on the given connection.
    ///
    /// An explicit `connection.port` wins over a port embedded in
    /// `connection.host`; without either the surface's default port is used.
    ///
    pub fn build(&self, connection: &Connection) -> Result<Url> {
        let (host, host_port) = split_host_port(connection.host.trim())?;
        let port = connection
            .port
            .or(host_port)
            .unwrap_or(self.surface.default_port());
        let scheme = connection
            .scheme
            .unwrap_or(self.surface.default_scheme());
        let netloc = format!("{}:{}", host, port);
        let path = self.path();

        let mut url = Url::parse(&format!("{}://{}{}", scheme.as_str(), netloc, path))?;

        // Key-sorted merge; explicit query parameters win over the resource's.
        let mut query: BTreeMap<String, String> = self
            .resource
            .split_once('?')
            .map(|(_, query)| url::form_urlencoded::parse(query.as_bytes()).into_owned().collect())
            .unwrap_or_default();
        query.extend(self.query.clone());
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query.iter());
        }

        validate(url, &netloc, &path)
    }
}

/// Re-checks a built URL against the expected network location and path.
///
/// # Arguments
///
/// * `url`: URL to check.
/// * `netloc`: Expected `host:port`.
/// * `path`: Expected path.
///
/// # Returns
///
/// The same URL when scheme, network location and path all match.
///
pub fn validate(url: Url, netloc: &str, path: &str) -> Result<Url> {
    if !url.scheme().starts_with("http") {
        return Err(Error::Config(format!("unsupported URL scheme in '{}'", url)));
    }

    let actual_netloc = match (url.host_str(), url.port_or_known_default()) {
        (Some(host), Some(port)) => format!("{}:{}", host, port),
        _ => return Err(Error::Config(format!("URL '{}' has no host", url))),
    };
    if !actual_netloc.eq_ignore_ascii_case(netloc) {
        return Err(Error::Config(format!(
            "URL '{}' points to '{}', expected '{}'",
            url, actual_netloc, netloc
        )));
    }
    if url.path() != path {
        return Err(Error::Config(format!(
            "URL '{}' has path '{}', expected '{}'",
            url,
            url.path(),
            path
        )));
    }

    Ok(url)
}

fn split_host_port(host: &str) -> Result<(&str, Option<u16>)> {
    let parse_port = |port: &str| {
        port.parse::<u16>()
            .map_err(|_| Error::Config(format!("invalid port in host '{}'", host)))
    };

    if host.starts_with('[') {
        return match host.split_once("]:") {
            Some((address, port)) => Ok((&host[..address.len() + 1], Some(parse_port(port)?))),
            None => Ok((host, None)),
        };
    }
    match host.split_once(':') {
        Some((name, port)) if !port.contains(':') => Ok((name, Some(parse_port(port)?))),
        _ => Ok((host, None)),
    }
}
