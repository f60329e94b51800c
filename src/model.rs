use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A product mirrored from the remote catalog. Replaced wholesale on every item sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commodity {
    pub item_id: i64,
    pub detail_url: String,
    pub image: String,
    /// Minor currency units.
    pub price: i64,
    pub title: String,
}

/// A grouping label mirrored from the remote catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub tag_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    Regular,
    Admin,
}

impl UserType {
    pub fn code(self) -> i64 {
        match self {
            UserType::Regular => 0,
            UserType::Admin => 1,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(UserType::Regular),
            1 => Some(UserType::Admin),
            _ => None,
        }
    }
}

/// Console operator. `password` is compared as plain text by the login screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password: String,
    /// The remote tag this user manages, if any.
    pub tag_id: Option<i64>,
    pub user_type: UserType,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.user_type == UserType::Admin
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub tag_id: Option<i64>,
    pub user_type: UserType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    #[serde(rename = "default_command")]
    Default,
    SyncItem,
    SyncTag,
}

impl CommandKind {
    pub fn code(self) -> i64 {
        match self {
            CommandKind::Default => 0,
            CommandKind::SyncItem => 1,
            CommandKind::SyncTag => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(CommandKind::Default),
            1 => Some(CommandKind::SyncItem),
            2 => Some(CommandKind::SyncTag),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Failure,
    Success,
}

impl CommandStatus {
    pub fn code(self) -> i64 {
        match self {
            CommandStatus::Failure => 0,
            CommandStatus::Success => 1,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(CommandStatus::Failure),
            1 => Some(CommandStatus::Success),
            _ => None,
        }
    }
}

/// Operator-issued instruction and the audit record of its outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub id: i64,
    pub kind: CommandKind,
    pub reason: String,
    /// Raw JSON parameters as the operator typed them.
    pub extra: Option<String>,
    pub create_time: DateTime<Utc>,
    pub status: CommandStatus,
    /// Error detail when `status` is `Failure`.
    pub diagnostics: Option<String>,
}

/// What the operator submits from the admin form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub kind: CommandKind,
    pub reason: String,
    pub extra: Option<String>,
}

impl CommandRequest {
    pub fn new(kind: CommandKind, reason: impl Into<String>, extra: Option<&str>) -> Self {
        Self {
            kind,
            reason: reason.into(),
            extra: extra.map(str::to_string),
        }
    }
}
