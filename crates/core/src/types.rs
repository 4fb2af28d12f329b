/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Free-form user identifier supplied by the client (path segment) or the
/// worker (progress payload). No referential integrity is implied.
pub type UserId = String;
