//! Node address resolution.
//!
//! A node can be named either by URL (`http://127.0.0.1:5001`) or by
//! multiaddr (`/ip4/127.0.0.1/tcp/5001/http`). Both resolve to the same
//! [`BaseUrl`], which the sessions use to build RPC endpoints.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use url::Url;

/// Path every RPC endpoint lives under.
pub const API_BASE: &str = "api/v0";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("node address is empty")]
    Empty,

    #[error("invalid node url '{addr}': {reason}")]
    InvalidUrl { addr: String, reason: String },

    #[error("unsupported multiaddr protocol '{segment}' in {addr}")]
    UnknownProtocol { addr: String, segment: String },

    #[error("multiaddr {addr}: '{protocol}' is missing its value")]
    MissingValue { addr: String, protocol: String },

    #[error("multiaddr {addr}: invalid {protocol} host '{value}'")]
    InvalidHost {
        addr: String,
        protocol: String,
        value: String,
    },

    #[error("multiaddr {addr}: invalid tcp port '{value}'")]
    InvalidPort { addr: String, value: String },

    #[error("multiaddr {addr}: expected {expected}, found '{segment}'")]
    UnexpectedSegment {
        addr: String,
        expected: &'static str,
        segment: String,
    },

    #[error("multiaddr {addr}: missing {expected} segment")]
    MissingSegment {
        addr: String,
        expected: &'static str,
    },
}

/// Canonical base URL of a node: `scheme://host[:port][/prefix]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BaseUrl(Url);

impl BaseUrl {
    pub fn as_str(&self) -> &str {
        self.0.as_str().trim_end_matches('/')
    }

    pub fn url(&self) -> &Url {
        &self.0
    }

    pub fn scheme(&self) -> &str {
        self.0.scheme()
    }

    /// Absolute URL of an RPC endpoint, e.g. `endpoint("pin/add")`.
    pub fn endpoint(&self, path: &str) -> Url {
        let mut url = self.0.clone();
        let joined = format!(
            "{}/{}/{}",
            self.0.path().trim_end_matches('/'),
            API_BASE,
            path.trim_start_matches('/')
        );
        url.set_path(&joined);
        url
    }
}

impl fmt::Display for BaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IpProtocol {
    Ip4,
    Ip6,
}

/// A node address in one of the two accepted syntaxes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeAddress {
    Url(Url),
    Multiaddr {
        host: String,
        port: u16,
        secure: bool,
    },
}

impl NodeAddress {
    pub fn parse(addr: &str) -> Result<Self, AddressError> {
        let addr = addr.trim();
        if addr.is_empty() {
            return Err(AddressError::Empty);
        }
        if addr.starts_with('/') {
            parse_multiaddr(addr)
        } else {
            parse_url(addr)
        }
    }

    pub fn is_multiaddr(&self) -> bool {
        matches!(self, NodeAddress::Multiaddr { .. })
    }

    pub fn resolve(&self) -> BaseUrl {
        match self {
            NodeAddress::Url(url) => BaseUrl(url.clone()),
            NodeAddress::Multiaddr { host, port, secure } => {
                let scheme = if *secure { "https" } else { "http" };
                let netloc = if host.contains(':') {
                    format!("[{}]:{}", host, port)
                } else {
                    format!("{}:{}", host, port)
                };
                let url = Url::parse(&format!("{}://{}", scheme, netloc))
                    .expect("validated multiaddr host and port must form a URL");
                BaseUrl(url)
            }
        }
    }
}

impl FromStr for NodeAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Resolve a URL or multiaddr into the canonical base URL of the node.
pub fn resolve(addr: &str) -> Result<BaseUrl, AddressError> {
    NodeAddress::parse(addr).map(|a| a.resolve())
}

fn parse_url(addr: &str) -> Result<NodeAddress, AddressError> {
    let invalid = |reason: &str| AddressError::InvalidUrl {
        addr: addr.to_string(),
        reason: reason.to_string(),
    };

    let mut url = Url::parse(addr).map_err(|e| invalid(&e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(&format!("unsupported scheme '{}'", other))),
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host"));
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(invalid("credentials belong in the auth config"));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(invalid("query and fragment are not allowed"));
    }

    let path = url.path().trim_end_matches('/').to_string();
    url.set_path(&path);
    Ok(NodeAddress::Url(url))
}

fn parse_multiaddr(addr: &str) -> Result<NodeAddress, AddressError> {
    let mut segments = addr[1..].split('/').peekable();

    let mut next = |expected: &'static str| -> Result<String, AddressError> {
        match segments.next() {
            Some(s) if !s.is_empty() => Ok(s.to_string()),
            Some(_) if segments.peek().is_none() => Err(AddressError::MissingSegment {
                addr: addr.to_string(),
                expected,
            }),
            Some(_) => Err(AddressError::UnexpectedSegment {
                addr: addr.to_string(),
                expected,
                segment: String::new(),
            }),
            None => Err(AddressError::MissingSegment {
                addr: addr.to_string(),
                expected,
            }),
        }
    };

    // (ip4|ip6, host)
    let proto = next("ip4 or ip6")?;
    let ip = match proto.as_str() {
        "ip4" => IpProtocol::Ip4,
        "ip6" => IpProtocol::Ip6,
        _ => {
            return Err(AddressError::UnknownProtocol {
                addr: addr.to_string(),
                segment: proto,
            })
        }
    };
    let host = next("host").map_err(|_| AddressError::MissingValue {
        addr: addr.to_string(),
        protocol: proto.clone(),
    })?;
    let host_ok = match ip {
        IpProtocol::Ip4 => Ipv4Addr::from_str(&host).is_ok(),
        IpProtocol::Ip6 => Ipv6Addr::from_str(&host).is_ok(),
    };
    if !host_ok {
        return Err(AddressError::InvalidHost {
            addr: addr.to_string(),
            protocol: proto,
            value: host,
        });
    }

    // (tcp, port)
    let proto = next("tcp")?;
    if proto != "tcp" {
        return Err(if is_known_protocol(&proto) {
            AddressError::UnexpectedSegment {
                addr: addr.to_string(),
                expected: "tcp",
                segment: proto,
            }
        } else {
            AddressError::UnknownProtocol {
                addr: addr.to_string(),
                segment: proto,
            }
        });
    }
    let port = next("port").map_err(|_| AddressError::MissingValue {
        addr: addr.to_string(),
        protocol: "tcp".to_string(),
    })?;
    let port = port.parse::<u16>().map_err(|_| AddressError::InvalidPort {
        addr: addr.to_string(),
        value: port.clone(),
    })?;

    // http|https
    let proto = next("http or https")?;
    let secure = match proto.as_str() {
        "http" => false,
        "https" => true,
        _ if is_known_protocol(&proto) => {
            return Err(AddressError::UnexpectedSegment {
                addr: addr.to_string(),
                expected: "http or https",
                segment: proto,
            })
        }
        _ => {
            return Err(AddressError::UnknownProtocol {
                addr: addr.to_string(),
                segment: proto,
            })
        }
    };

    // a single trailing slash is tolerated
    match segments.next() {
        None => {}
        Some("") if segments.peek().is_none() => {}
        Some(extra) => {
            return Err(AddressError::UnexpectedSegment {
                addr: addr.to_string(),
                expected: "end of address",
                segment: extra.to_string(),
            })
        }
    }

    Ok(NodeAddress::Multiaddr { host, port, secure })
}

fn is_known_protocol(token: &str) -> bool {
    matches!(token, "ip4" | "ip6" | "tcp" | "http" | "https")
}
