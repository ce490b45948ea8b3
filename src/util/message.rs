#[allow(unused)]

pub static MESSAGE_DATA_SAVED: &str = "data saved and user profile updated";
pub static MESSAGE_CONNECTION_TEST: &str = "connection test successful";
pub static MESSAGE_MISSING_FIELDS: &str = "payload is missing required account data";
pub static MESSAGE_PLAYER_DATA: &str = "player data retrieved";
pub static MESSAGE_PUBLIC_DATA: &str = "player summaries retrieved";
pub static MESSAGE_PLAYER_NOT_FOUND: &str = "player data not found";
pub static MESSAGE_NOT_FOUND: &str = "resource not found";
pub static MESSAGE_RANKINGS_READY: &str = "rankings retrieved";
pub static MESSAGE_HEALTH_STATUS: &str = "reference cache status";

pub static MESSAGE_INTERNAL_SERVER_ERROR: &str = "internal server error";
pub static MESSAGE_TOO_MANY_REQUESTS: &str = "too many requests";

pub static STATUS_OK: &str = "ok";
pub static STATUS_ERROR: &str = "error";
pub static STATUS_UNAUTHORIZED: &str = "unauthorized";
pub static STATUS_INTERNAL_SERVER_ERROR: &str = "internal server error";
pub static STATUS_FORBIDDEN: &str = "forbidden";
pub static STATUS_NOT_FOUND: &str = "not found";
pub static STATUS_CREATED: &str = "created";
pub static STATUS_BAD_REQUEST: &str = "bad request";
pub static STATUS_TOO_MANY_REQUESTS: &str = "too many requests";
