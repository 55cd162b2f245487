pub const MONGO_DB_ENV_URL: &'static str = "FRIAR_MONGO_URL";
pub const MONGO_DB_DATABASE_ENV: &'static str = "FRIAR_MONGO_DATABASE";
pub const MONGO_DB_APP_NAME_ENV: &'static str = "FRIAR_MONGO_APP_NAME";
pub const MONGO_DB_CONNECT_TIMEOUT_ENV: &'static str = "FRIAR_MONGO_CONNECT_TIMEOUT_MS";
pub const MONGO_DB_OPTIONS_ENV: &'static str = "FRIAR_MONGO_OPTIONS";

pub const MONGO_DB_SCHEME: &'static str = "mongodb://";
pub const MONGO_DB_APP_NAME: &'static str = "friar";
pub const MONGO_DB_DEFAULT_DATABASE: &'static str = "test";

// Replica set members without an explicit port are assumed to listen here.
pub const REPLICA_SET_DEFAULT_PORT: u16 = 1337;

pub const OPEN_WAIT_SECONDS: u64 = 30;
