//! Core type definitions

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// A game server as announced by a principal server
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub ip: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(ip: impl Into<String>, port: u16) -> Self {
        Self { ip: ip.into(), port }
    }

    /// Principals pad their lists with `0.0.0.0` and port 0 entries
    pub fn is_placeholder(&self) -> bool {
        self.ip == "0.0.0.0" || self.port == 0
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

/// Socket type used to talk to a server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransportKind {
    /// UDP, every packet is self-contained
    #[default]
    Datagram,
    /// TCP, only the first chunk carries a response header
    Stream,
}

impl TransportKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "udp" | "datagram" => Some(Self::Datagram),
            "tcp" | "stream" => Some(Self::Stream),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Datagram => "udp",
            Self::Stream => "tcp",
        }
    }
}

/// One line of the player list in a status response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Not reported by Medal of Honor servers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frags: Option<i32>,
    pub ping: i32,
    pub name: String,
    /// Name as received, only kept when `name` had its colour codes stripped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colored_name: Option<String>,
}

/// Server variables in the order the server sent them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Variables(Vec<(String, String)>);

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a variable, replacing the value of an existing key in place
    pub fn insert(&mut self, key: String, value: String) {
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl Serialize for Variables {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Variables {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut vars = Self::new();
        for (k, v) in iter {
            vars.insert(k.into(), v.into());
        }
        vars
    }
}

/// Decoded `statusResponse` of a single game server
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerStatus {
    pub ip: String,
    pub port: u16,
    pub variables: Variables,
    pub players: Vec<Player>,
}

impl ServerStatus {
    /// Shortcut for the commonly used `sv_hostname` variable
    pub fn hostname(&self) -> Option<&str> {
        self.variables.get("sv_hostname")
    }
}
