/// Tasks are keyed by a client-opaque UUID v4, assigned at creation.
pub type TaskId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
