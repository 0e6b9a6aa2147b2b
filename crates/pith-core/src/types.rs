use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp-based session identifier, format `YYYYMMDDTHHMMSS.<unix_seconds>`.
///
/// Unlike the source project's structured `user:agent:name` session key, this
/// format is mandated directly by the data model: single-user deployments
/// don't need a composite key, just a sortable, collision-resistant string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    /// Generate a new session id from the current wall-clock time.
    pub fn generate() -> Self {
        let now = Utc::now();
        Self(format!(
            "{}.{}",
            now.format("%Y%m%dT%H%M%S"),
            now.timestamp()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Which half of the profile a field belongs to. Primary key component
/// alongside `key` in the `profiles` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileType {
    Agent,
    User,
}

impl fmt::Display for ProfileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileType::Agent => write!(f, "agent"),
            ProfileType::User => write!(f, "user"),
        }
    }
}

impl std::str::FromStr for ProfileType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "agent" => Ok(ProfileType::Agent),
            "user" => Ok(ProfileType::User),
            other => Err(format!("invalid profile_type: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_generate_matches_shape() {
        let id = SessionId::generate();
        let (date_part, unix_part) = id.as_str().split_once('.').expect("dot separator");
        assert_eq!(date_part.len(), 15); // YYYYMMDDTHHMMSS
        assert!(unix_part.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn profile_type_roundtrip() {
        assert_eq!("agent".parse::<ProfileType>().unwrap(), ProfileType::Agent);
        assert_eq!("user".parse::<ProfileType>().unwrap(), ProfileType::User);
        assert!("child".parse::<ProfileType>().is_err());
    }
}
