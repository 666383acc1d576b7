use std::path::PathBuf;

use roster_core::ingest::DEFAULT_MAX_WORKERS;
use roster_db::store::DEFAULT_BATCH_SIZE;

/// Default upload limit for the import route (10 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Upper bound on concurrent row conversions during an import.
    pub import_max_workers: usize,
    /// Rows per INSERT statement when committing an import.
    pub import_batch_size: usize,
    /// Body limit for spreadsheet uploads.
    pub max_upload_bytes: usize,
    /// Directory export workbooks are staged in before being streamed.
    pub export_dir: PathBuf,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `IMPORT_MAX_WORKERS`   | `8`                        |
    /// | `IMPORT_BATCH_SIZE`    | `500`                      |
    /// | `MAX_UPLOAD_BYTES`     | `10485760`                 |
    /// | `EXPORT_DIR`           | OS temp dir                |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let import_max_workers: usize = std::env::var("IMPORT_MAX_WORKERS")
            .map(|v| v.parse().expect("IMPORT_MAX_WORKERS must be a valid usize"))
            .unwrap_or(DEFAULT_MAX_WORKERS);

        let import_batch_size: usize = std::env::var("IMPORT_BATCH_SIZE")
            .map(|v| v.parse().expect("IMPORT_BATCH_SIZE must be a valid usize"))
            .unwrap_or(DEFAULT_BATCH_SIZE);

        let max_upload_bytes: usize = std::env::var("MAX_UPLOAD_BYTES")
            .map(|v| v.parse().expect("MAX_UPLOAD_BYTES must be a valid usize"))
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);

        let export_dir = std::env::var("EXPORT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::temp_dir());

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            import_max_workers,
            import_batch_size,
            max_upload_bytes,
            export_dir,
        }
    }
}
