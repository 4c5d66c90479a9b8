//! Contextual restrictions carried by token blocks.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, de};
use serde_json::Value;

use crate::TokenError;

/// A contextual restriction that must hold for a token to be accepted.
///
/// Serialized as an internally tagged object, e.g.
/// `{"type": "ip", "allowed_ips": ["10.0.0.1"]}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Caveat {
    /// The token is void once the clock passes `not_after` (UNIX seconds).
    Time {
        /// Last valid UNIX second
        not_after: u64,
    },
    /// Requests must originate from one of these addresses.
    Ip {
        /// Allowed source addresses
        allowed_ips: Vec<String>,
    },
    /// Requests may only touch these resources.
    Resource {
        /// Allowed resource identifiers
        resources: Vec<String>,
    },
    /// Declares the scopes a holder intends to exercise.
    ///
    /// Carried for downstream consumers; verification does not evaluate it.
    Scope {
        /// Declared scopes
        scopes: Vec<String>,
    },
    /// Only these agents may be the token's subject.
    Agent {
        /// Allowed subject agent ids
        agent_ids: Vec<String>,
    },
}

/// The tag of a [`Caveat`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaveatType {
    /// [`Caveat::Time`]
    Time,
    /// [`Caveat::Ip`]
    Ip,
    /// [`Caveat::Resource`]
    Resource,
    /// [`Caveat::Scope`]
    Scope,
    /// [`Caveat::Agent`]
    Agent,
}

impl CaveatType {
    /// The wire tag for this caveat type.
    pub fn as_str(&self) -> &'static str {
        match self {
            CaveatType::Time => "time",
            CaveatType::Ip => "ip",
            CaveatType::Resource => "resource",
            CaveatType::Scope => "scope",
            CaveatType::Agent => "agent",
        }
    }

    /// Parse a wire tag.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::UnknownCaveatType`] for unrecognized tags.
    pub fn parse(tag: &str) -> Result<Self, TokenError> {
        match tag {
            "time" => Ok(CaveatType::Time),
            "ip" => Ok(CaveatType::Ip),
            "resource" => Ok(CaveatType::Resource),
            "scope" => Ok(CaveatType::Scope),
            "agent" => Ok(CaveatType::Agent),
            other => Err(TokenError::UnknownCaveatType(other.to_string())),
        }
    }
}

impl fmt::Display for CaveatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Caveat {
    /// A [`Caveat::Time`] expiring at `not_after`.
    pub fn time(not_after: u64) -> Self {
        Caveat::Time { not_after }
    }

    /// A [`Caveat::Ip`] allow-list.
    pub fn ip<I: IntoIterator<Item = S>, S: Into<String>>(allowed_ips: I) -> Self {
        Caveat::Ip {
            allowed_ips: allowed_ips.into_iter().map(Into::into).collect(),
        }
    }

    /// A [`Caveat::Resource`] allow-list.
    pub fn resource<I: IntoIterator<Item = S>, S: Into<String>>(resources: I) -> Self {
        Caveat::Resource {
            resources: resources.into_iter().map(Into::into).collect(),
        }
    }

    /// A [`Caveat::Scope`] declaration.
    pub fn scope<I: IntoIterator<Item = S>, S: Into<String>>(scopes: I) -> Self {
        Caveat::Scope {
            scopes: scopes.into_iter().map(Into::into).collect(),
        }
    }

    /// A [`Caveat::Agent`] allow-list.
    pub fn agent<I: IntoIterator<Item = S>, S: Into<String>>(agent_ids: I) -> Self {
        Caveat::Agent {
            agent_ids: agent_ids.into_iter().map(Into::into).collect(),
        }
    }

    /// The variant tag.
    pub fn caveat_type(&self) -> CaveatType {
        match self {
            Caveat::Time { .. } => CaveatType::Time,
            Caveat::Ip { .. } => CaveatType::Ip,
            Caveat::Resource { .. } => CaveatType::Resource,
            Caveat::Scope { .. } => CaveatType::Scope,
            Caveat::Agent { .. } => CaveatType::Agent,
        }
    }

    /// Evaluate this caveat against the facts of a single request.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Expired`] for a lapsed time caveat and
    /// [`TokenError::CaveatViolation`] for any other failing caveat.
    pub fn check(&self, request: &CaveatContext<'_>) -> Result<(), TokenError> {
        match self {
            Caveat::Time { not_after } => {
                if request.now > *not_after {
                    return Err(TokenError::Expired {
                        not_after: *not_after,
                    });
                }
            }
            Caveat::Ip { allowed_ips } => {
                if let Some(ip) = request.source_ip {
                    if !allowed_ips.iter().any(|allowed| allowed == ip) {
                        return Err(self.violation(format!("source IP {ip} is not allowed")));
                    }
                }
            }
            Caveat::Resource { resources } => {
                if let Some(resource) = request.resource {
                    if !resources.iter().any(|allowed| allowed == resource) {
                        return Err(
                            self.violation(format!("resource {resource} is not allowed"))
                        );
                    }
                }
            }
            Caveat::Agent { agent_ids } => {
                if !agent_ids.iter().any(|allowed| allowed == request.subject) {
                    return Err(self.violation(format!(
                        "subject agent {} is not allowed",
                        request.subject
                    )));
                }
            }
            Caveat::Scope { .. } => {}
        }
        Ok(())
    }

    fn violation(&self, reason: String) -> TokenError {
        TokenError::CaveatViolation {
            caveat_type: self.caveat_type(),
            reason,
        }
    }
}

/// Request facts caveats are evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct CaveatContext<'a> {
    /// Current UNIX time in seconds
    pub now: u64,
    /// Address the request came from, if known
    pub source_ip: Option<&'a str>,
    /// Resource the request targets, if known
    pub resource: Option<&'a str>,
    /// Subject agent of the token being verified
    pub subject: &'a str,
}

impl TryFrom<Value> for Caveat {
    type Error = TokenError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let tag = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| TokenError::Malformed("caveat is missing its type".to_string()))?;
        CaveatType::parse(tag)?;
        let caveat: TaggedCaveat = serde_json::from_value(value)?;
        Ok(caveat.into())
    }
}

impl<'de> Deserialize<'de> for Caveat {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Caveat::try_from(value).map_err(de::Error::custom)
    }
}

/// Derived decoding for the known variants; unknown tags are screened out
/// before this runs.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum TaggedCaveat {
    Time { not_after: u64 },
    Ip { allowed_ips: Vec<String> },
    Resource { resources: Vec<String> },
    Scope { scopes: Vec<String> },
    Agent { agent_ids: Vec<String> },
}

impl From<TaggedCaveat> for Caveat {
    fn from(caveat: TaggedCaveat) -> Self {
        match caveat {
            TaggedCaveat::Time { not_after } => Caveat::Time { not_after },
            TaggedCaveat::Ip { allowed_ips } => Caveat::Ip { allowed_ips },
            TaggedCaveat::Resource { resources } => Caveat::Resource { resources },
            TaggedCaveat::Scope { scopes } => Caveat::Scope { scopes },
            TaggedCaveat::Agent { agent_ids } => Caveat::Agent { agent_ids },
        }
    }
}
