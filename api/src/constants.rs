//! Application constants

/// Version reported with every analysis result and by /health
pub const MODEL_VERSION: &str = "1.0.0";

/// Service name reported by /health
pub const SERVICE_NAME: &str = "ai-inference";

pub const DEFAULT_PORT: u16 = 5000;

/// Maximum upload size in megabytes unless `MAX_UPLOAD_MB` says otherwise
pub const DEFAULT_MAX_UPLOAD_MB: usize = 200;
