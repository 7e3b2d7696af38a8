use log::LevelFilter;

pub const DEFAULT_LEVEL_FILTER: LevelFilter = LevelFilter::Info;
/// The login user of the default image.
pub const DEFAULT_SSH_USER: &str = "core";
pub const DEFAULT_SSH_CONNECT_TIMEOUT_SECS: u64 = 10;
