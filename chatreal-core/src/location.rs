//! Page location and navigation history
//!
//! The `room` query parameter is the only shareable state of the app. These
//! types parse it out of a URL and record `push_state` navigations the way a
//! browser history stack would, without ever reloading anything.

use crate::ChatRealError;
use std::fmt;

/// Query parameter that carries the room id
pub const ROOM_PARAM: &str = "room";

/// A parsed page URL: `<origin><pathname><search>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    origin: String,
    pathname: String,
    search: String,
}

impl Location {
    /// Parse an absolute URL such as `https://host:8080/app/?room=1-abcdefg`
    ///
    /// Fragments are dropped.
    pub fn parse(url: &str) -> Result<Self, ChatRealError> {
        let invalid = || ChatRealError::InvalidUrl {
            url: url.to_string(),
        };

        let (scheme, rest) = url.split_once("://").ok_or_else(invalid)?;
        if scheme.is_empty() || !scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '+') {
            return Err(invalid());
        }

        let rest = rest.split('#').next().unwrap_or_default();
        let host_end = rest.find(['/', '?']).unwrap_or(rest.len());
        let (host, tail) = rest.split_at(host_end);
        if host.is_empty() {
            return Err(invalid());
        }

        let (path, query) = match tail.split_once('?') {
            Some((path, query)) => (path, query),
            None => (tail, ""),
        };

        Ok(Self {
            origin: format!("{}://{}", scheme, host),
            pathname: if path.is_empty() { "/".to_string() } else { path.to_string() },
            search: if query.is_empty() { String::new() } else { format!("?{}", query) },
        })
    }

    /// Scheme and host, e.g. `https://chat.example`
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Path component, always starting with `/`
    pub fn pathname(&self) -> &str {
        &self.pathname
    }

    /// Query string including the leading `?`, or empty
    pub fn search(&self) -> &str {
        &self.search
    }

    /// First value of a query parameter, percent-decoded
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.search
            .trim_start_matches('?')
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
            .find(|(key, _)| decode_component(key) == name)
            .map(|(_, value)| decode_component(value))
    }

    /// The room id carried in the URL, if any (empty values count as absent)
    pub fn room_id(&self) -> Option<String> {
        self.query_param(ROOM_PARAM).filter(|room| !room.is_empty())
    }

    /// Relative URL that opens the given room on this page
    pub fn room_path(&self, room_id: &str) -> String {
        format!("{}?{}={}", self.pathname, ROOM_PARAM, room_id)
    }

    /// Apply a same-origin relative URL (`/path?query`) as `pushState` would
    fn with_relative(&self, relative: &str) -> Self {
        let (path, query) = match relative.split_once('?') {
            Some((path, query)) => (path, query),
            None => (relative, ""),
        };
        Self {
            origin: self.origin.clone(),
            pathname: if path.is_empty() { self.pathname.clone() } else { path.to_string() },
            search: if query.is_empty() { String::new() } else { format!("?{}", query) },
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.origin, self.pathname, self.search)
    }
}

fn decode_component(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' if i + 2 < bytes.len() => {
                match (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        out.push(hi << 4 | lo);
                        i += 2;
                    }
                    _ => out.push(b'%'),
                }
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Navigation history driven by `push_state`
#[derive(Debug, Clone)]
pub struct History {
    entries: Vec<Location>,
}

impl History {
    /// Start a history at the given location
    pub fn new(initial: Location) -> Self {
        Self {
            entries: vec![initial],
        }
    }

    /// Current location
    pub fn current(&self) -> &Location {
        // `entries` is never empty: constructed with one and only ever pushed to.
        &self.entries[self.entries.len() - 1]
    }

    /// Push a same-origin relative URL without reloading
    pub fn push_state(&mut self, relative_url: &str) {
        let next = self.current().with_relative(relative_url);
        tracing::debug!("pushState {}", next);
        self.entries.push(next);
    }

    /// Number of entries, including the initial one
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false; a history holds at least its initial entry
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_url() {
        let location = Location::parse("https://chat.example:8443/app/?room=1-abcdefg#top").unwrap();
        assert_eq!(location.origin(), "https://chat.example:8443");
        assert_eq!(location.pathname(), "/app/");
        assert_eq!(location.search(), "?room=1-abcdefg");
        assert_eq!(location.room_id().as_deref(), Some("1-abcdefg"));
        assert_eq!(location.to_string(), "https://chat.example:8443/app/?room=1-abcdefg");
    }

    #[test]
    fn test_parse_without_path() {
        let location = Location::parse("http://localhost:3000?room=x").unwrap();
        assert_eq!(location.pathname(), "/");
        assert_eq!(location.room_id().as_deref(), Some("x"));

        let bare = Location::parse("http://localhost:3000").unwrap();
        assert_eq!(bare.search(), "");
        assert!(bare.room_id().is_none());
    }

    #[test]
    fn test_parse_rejects_relative() {
        assert!(Location::parse("/app?room=1").is_err());
        assert!(Location::parse("http://").is_err());
    }

    #[test]
    fn test_query_decoding() {
        let location =
            Location::parse("http://h/?other=1&room=12%2Dab+cd&room=second&bad=%zz").unwrap();
        assert_eq!(location.query_param("room").as_deref(), Some("12-ab cd"));
        assert_eq!(location.query_param("bad").as_deref(), Some("%zz"));
        assert_eq!(location.query_param("other").as_deref(), Some("1"));
        assert!(location.query_param("missing").is_none());
    }

    #[test]
    fn test_empty_room_param_is_absent() {
        let location = Location::parse("http://h/?room=").unwrap();
        assert!(location.room_id().is_none());
    }

    #[test]
    fn test_push_state() {
        let mut history = History::new(Location::parse("https://h/app/").unwrap());
        let room_path = history.current().room_path("5-abcdefg");
        history.push_state(&room_path);
        assert_eq!(history.current().to_string(), "https://h/app/?room=5-abcdefg");

        let path = history.current().pathname().to_string();
        history.push_state(&path);
        assert_eq!(history.current().to_string(), "https://h/app/");
        assert_eq!(history.len(), 3);
    }
}
