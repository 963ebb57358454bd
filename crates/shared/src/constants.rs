pub const APP_NAME: &str = "Parley";

// Limits
pub const MAX_MESSAGE_LENGTH: usize = 4000;
pub const MAX_TENANT_KEY_LENGTH: usize = 63;

// Rate limiting (per sender, sliding window)
pub const RATE_LIMIT_MAX_SENDS: usize = 5;
pub const RATE_LIMIT_WINDOW_MS: u64 = 2_000;

// Presence
pub const USER_STATUSES: [&str; 4] = ["online", "busy", "offline", "away"];

// Tenancy
pub const DEFAULT_TENANT_KEY: &str = "default";
pub const DEFAULT_TENANT_HEADER: &str = "x-tenant-id";
