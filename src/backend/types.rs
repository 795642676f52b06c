use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sort direction for ordered reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Ascending => "asc",
            Direction::Descending => "desc",
        }
    }
}

/// Ordering applied by the store to a full-table read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub direction: Direction,
}

impl Order {
    pub fn new(column: impl Into<String>, direction: Direction) -> Self {
        Self {
            column: column.into(),
            direction,
        }
    }

    /// Most recently created rows first
    pub fn newest_first() -> Self {
        Self::new("created_at", Direction::Descending)
    }
}

/// An authenticated admin session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub email: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// A local file waiting to be pushed to object storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, content_type: Option<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type,
            bytes,
        }
    }
}
