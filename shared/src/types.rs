//! Core shared types and identifiers

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::errors::{SharedError, SharedResult};

/// Unique identifier for judges
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JudgeId(Uuid);

impl JudgeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> SharedResult<Self> {
        parse_uuid(s).map(Self)
    }

    /// The nil id marks a judge that has not been stored yet
    pub fn nil() -> Self {
        Self(Uuid::nil())
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl fmt::Display for JudgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for projects
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(Uuid);

impl ProjectId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> SharedResult<Self> {
        parse_uuid(s).map(Self)
    }
}

impl Default for ProjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn parse_uuid(s: &str) -> SharedResult<Uuid> {
    Uuid::parse_str(s.trim()).map_err(|_| SharedError::InvalidUuid {
        input: s.to_string(),
    })
}

/// Group of projects, numbered by position in the group layout
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub i64);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group_{}", self.0)
    }
}

/// Reason a judge gave for skipping a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagReason {
    /// Team is not present at their table
    Absent,
    /// Team cannot prove they made the project
    CannotDemo,
    /// Appears too complex to have been built during the event
    TooComplex,
    /// Offensive or breaks the code of conduct
    Offensive,
    /// Another judge is currently at the table
    Busy,
}

impl FlagReason {
    /// Busy skips are transient and are not recorded as flags
    pub fn is_recorded(&self) -> bool {
        !matches!(self, FlagReason::Busy)
    }
}

impl fmt::Display for FlagReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlagReason::Absent => write!(f, "absent"),
            FlagReason::CannotDemo => write!(f, "cannot_demo"),
            FlagReason::TooComplex => write!(f, "too_complex"),
            FlagReason::Offensive => write!(f, "offensive"),
            FlagReason::Busy => write!(f, "busy"),
        }
    }
}

impl std::str::FromStr for FlagReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "absent" => Ok(FlagReason::Absent),
            "cannot_demo" | "cannot-demo" => Ok(FlagReason::CannotDemo),
            "too_complex" | "too-complex" => Ok(FlagReason::TooComplex),
            "offensive" => Ok(FlagReason::Offensive),
            "busy" => Ok(FlagReason::Busy),
            _ => Err(format!("Unknown flag reason: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_judge_id_nil() {
        assert!(JudgeId::nil().is_nil());
        assert!(JudgeId::default().is_nil());
        assert!(!JudgeId::new().is_nil());
    }

    #[test]
    fn test_ids_serialize_as_plain_strings() {
        let id = ProjectId::from_string("550e8400-e29b-41d4-a716-446655440001").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"550e8400-e29b-41d4-a716-446655440001\"");
    }

    #[test]
    fn test_malformed_ids_are_rejected() {
        match JudgeId::from_string("table-7") {
            Err(SharedError::InvalidUuid { input }) => assert_eq!(input, "table-7"),
            other => panic!("expected InvalidUuid, got {other:?}"),
        }
        assert!(ProjectId::from_string("").is_err());

        let id = JudgeId::new();
        assert_eq!(JudgeId::from_string(&id.to_string()).unwrap(), id);
    }

    #[test]
    fn test_flag_reason_parsing() {
        assert_eq!("absent".parse::<FlagReason>().unwrap(), FlagReason::Absent);
        assert_eq!("Too-Complex".parse::<FlagReason>().unwrap(), FlagReason::TooComplex);
        assert!("sleepy".parse::<FlagReason>().is_err());
        assert!(!FlagReason::Busy.is_recorded());
        assert!(FlagReason::Offensive.is_recorded());
    }
}
