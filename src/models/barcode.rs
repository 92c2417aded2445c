use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Prefix for every key owned by the barcode service.
pub const BARCODE_PREFIX: &str = "barcode:";

/// Value of a status record once the barcode has been redeemed.
pub const USED_MARKER: &str = "used";

/// Key of the status record: holds the code while active, `used` afterwards.
pub fn status_key(code: &str) -> String {
    format!("{}{}", BARCODE_PREFIX, code)
}

/// Key of the metadata record: the issue-time snapshot as JSON.
pub fn dto_key(code: &str) -> String {
    format!("{}{}:dto", BARCODE_PREFIX, code)
}

/// A barcode as returned to callers and as stored in the metadata record.
///
/// Timestamps travel as epoch milliseconds. `physical_expire_at` is only
/// populated in the response to the call that issued the barcode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Barcode {
    pub user_id: String,
    pub code: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub logical_expire_at: DateTime<Utc>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub physical_expire_at: Option<DateTime<Utc>>,
    pub status: bool,
}
