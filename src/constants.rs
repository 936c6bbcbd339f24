//! Shared constants for dispatch, batching and client-state keys.

/// Default per-call item limit imposed by the remote service
pub const DEFAULT_MAX_BATCH_SIZE: usize = 100;

/// Default name of the dedicated worker thread
pub const DEFAULT_WORKER_THREAD_NAME: &str = "relay-worker";

/// Separator used when concatenating failed sub-task descriptions
pub const AGGREGATE_ERROR_SEPARATOR: &str = "; ";

/// Remote operation names used by the built-in operations
pub mod operations {
    pub const SUBSCRIBE: &str = "subscribe";
    pub const ROSTER_LIST: &str = "roster.list";
    pub const PROFILE_LOOKUP: &str = "profile.lookup";
    pub const PRESENCE_LOOKUP: &str = "presence.lookup";
    pub const RELATIONSHIP_STATUS: &str = "relationship.status";
}

/// Keys under which merged results are published in client state
pub mod results {
    pub const ROSTER: &str = "roster";
    pub const ROSTER_MEMBERS: &str = "roster.members";
    pub const PROFILES: &str = "profiles";
    pub const PRESENCE: &str = "presence";
    pub const RELATIONSHIPS: &str = "relationships";
}

/// Sub-task kinds tracked by the roster fan-out
pub mod roster_kinds {
    pub const DETAILS: &str = "details";
    pub const PRESENCE: &str = "presence";
    pub const RELATIONSHIPS: &str = "relationships";
}

/// Environment variables consulted by configuration and logging
pub mod env {
    pub const ENVIRONMENT: &str = "RELAY_ENV";
    pub const FALLBACK_ENVIRONMENT: &str = "APP_ENV";
    pub const CONFIG_PREFIX: &str = "RELAY";
    pub const LOG_FORMAT: &str = "RELAY_LOG_FORMAT";
}
