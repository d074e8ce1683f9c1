/// DNS-SD meta-query type. As a service filter entry it means "match any service".
pub const BROWSE_TYPE: &str = "_services._dns-sd._udp.local.";

/// TXT attribute carrying the stable device identity
pub const SERIAL_KEY: &str = "serial";

/// Content filter sentinel that accepts every response
pub const MATCH_ALL: &str = "*";

/// API path prefix
pub const API_PREFIX: &str = "/v1";
