//! Fixed capacities shared by the store, the feature-string builder and the
//! packet-inspection side that consumes resolved rules.

/// Maximum length in bytes of a rule id.
pub const RULE_ID_SIZE: usize = 32;

/// Maximum length in bytes of a group id.
pub const GROUP_ID_SIZE: usize = 32;

/// Capacity of a rule's generic app-category list.
pub const MAX_APP_IN_RULE: usize = 1024;

/// Capacity of a rule's exception-app list.
pub const MAX_EXCEPTION_APP_IN_RULE: usize = 16;

/// Capacity of a group's hardware address set.
pub const MAX_MAC_IN_GROUP: usize = 64;

/// Exception-app names longer than this are truncated.
pub const MAX_APP_NAME_LEN: usize = 64;

pub const MAX_HOST_URL_LEN: usize = 64;

pub const MAX_REQUEST_URL_LEN: usize = 128;

/// Destination-port ranges per exception app.
pub const MAX_PORT_RANGE_NUM: usize = 5;

/// Byte signatures per exception app.
pub const MAX_POS_INFO_PER_FEATURE: usize = 16;

/// Raw exception sources shorter than this are skipped before any builder runs.
pub const MIN_FEATURE_STR_LEN: usize = 16;

/// App id carried by every exception-app record. Lies outside the range used
/// by the generic app-category ids of the feature database.
pub const EXCEPT_APP_ID: u32 = 99_999;
