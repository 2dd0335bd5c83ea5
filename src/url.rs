//! Server address parsing for the client (`host`, `host:port`, `skiff://host[:port]`)

use crate::protocol::DEFAULT_PORT;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddr {
    pub host: String,
    pub port: u16,
}

pub fn parse_server_addr(s: &str) -> Option<ServerAddr> {
    let s_trim = s.trim();
    let lower = s_trim.to_ascii_lowercase();
    let rest = if lower.starts_with("skiff://") {
        &s_trim["skiff://".len()..]
    } else if lower.contains("://") {
        return None;
    } else {
        s_trim
    };
    let rest = rest.trim_end_matches('/');
    if rest.is_empty() {
        return None;
    }

    // [v6]:port
    if let Some(inner) = rest.strip_prefix('[') {
        let (host, after) = inner.split_once(']')?;
        let port = match after.strip_prefix(':') {
            Some(p) => p.parse().ok()?,
            None if after.is_empty() => DEFAULT_PORT,
            None => return None,
        };
        return Some(ServerAddr {
            host: host.to_string(),
            port,
        });
    }

    let (host, port) = match rest.rsplit_once(':') {
        // a bare v6 address has more than one colon
        Some((h, _)) if h.contains(':') => (rest.to_string(), DEFAULT_PORT),
        Some((h, p)) => (h.to_string(), p.parse().ok()?),
        None => (rest.to_string(), DEFAULT_PORT),
    };
    if host.is_empty() {
        return None;
    }
    Some(ServerAddr { host, port })
}
