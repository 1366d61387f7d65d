//! Typed identifiers and random id/name generation.
//!
//! Grounded in the teacher's `shared::ids` newtype-over-`String` macro.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn validate_identifier_value(kind: &str, value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err(format!("{kind} must be non-empty"));
    }
    if value
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
    {
        return Ok(());
    }
    Err(format!(
        "{kind} must use only ASCII letters, digits, '-' or '_'"
    ))
}

macro_rules! define_id_type {
    ($name:ident, $kind:literal) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn parse(raw: &str) -> Result<Self, String> {
                validate_identifier_value($kind, raw)?;
                Ok(Self(raw.to_string()))
            }

            pub fn new_random() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                self.as_str()
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }

        impl TryFrom<String> for $name {
            type Error = String;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(&value)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let raw = String::deserialize(deserializer)?;
                Self::parse(&raw).map_err(|err| {
                    D::Error::custom(format!("invalid {} `{}`: {}", $kind, raw, err))
                })
            }
        }
    };
}

define_id_type!(ChatId, "chat id");
define_id_type!(MessageId, "message id");
define_id_type!(StepId, "step id");
define_id_type!(JobId, "job id");

const ADJECTIVES: &[&str] = &[
    "Blue", "Crimson", "Golden", "Silver", "Quiet", "Swift", "Hidden", "Lucky", "Brave", "Calm",
    "Amber", "Velvet",
];
const ANIMALS: &[&str] = &[
    "Whale", "Falcon", "Otter", "Heron", "Lynx", "Panda", "Raven", "Tiger", "Dolphin", "Badger",
    "Sparrow", "Fox",
];

fn random_u32() -> u32 {
    let mut buf = [0u8; 4];
    // A failure here means the OS random source is gone, a process-fatal
    // condition everywhere this runs rather than a recoverable error.
    getrandom::getrandom(&mut buf).expect("system random source unavailable");
    u32::from_le_bytes(buf)
}

/// `{Adjective}{Animal}-####`, e.g. `BlueWhale-4821`.
pub fn generate_participant_name() -> String {
    let bits = random_u32();
    let adjective = ADJECTIVES[(bits as usize) % ADJECTIVES.len()];
    let animal = ANIMALS[((bits >> 8) as usize) % ANIMALS.len()];
    let tail = 1000 + ((bits >> 16) % 9000);
    format!("{adjective}{animal}-{tail}")
}

/// `{chat_id}_workflow_{random}` job id, per spec.
pub fn generate_job_id(chat_id: &ChatId) -> JobId {
    let suffix = format!("{:08x}", random_u32());
    JobId::parse(&format!("{}_workflow_{}", chat_id.as_str(), suffix))
        .expect("generated job id is always a valid identifier")
}

pub fn unix_millis_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn participant_name_matches_shape() {
        let name = generate_participant_name();
        let (adjective_animal, tail) = name.rsplit_once('-').expect("has tail");
        assert!(adjective_animal.chars().all(|c| c.is_ascii_alphabetic()));
        assert_eq!(tail.len(), 4);
        assert!(tail.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn job_id_embeds_chat_id() {
        let chat_id = ChatId::new_random();
        let job_id = generate_job_id(&chat_id);
        assert!(job_id.as_str().starts_with(chat_id.as_str()));
        assert!(job_id.as_str().contains("_workflow_"));
    }

    #[test]
    fn rejects_path_separators() {
        assert!(ChatId::parse("a/b").is_err());
        assert!(ChatId::parse("valid-id_123").is_ok());
    }
}
