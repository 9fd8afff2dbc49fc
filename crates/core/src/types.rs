/// Server primary keys are integer row ids.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Absolute instant expressed in milliseconds since the Unix epoch.
pub type EpochMillis = i64;
