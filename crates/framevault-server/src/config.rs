use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    /// Address to listen on.
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Root directory holding the upload directory and the metadata log.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Shared token for protected endpoints. Empty disables the check.
    #[serde(default)]
    pub token: String,

    /// Maximum number of archived frames kept on disk.
    #[serde(default = "default_max_keep")]
    pub max_keep: usize,

    /// Log output format: "json" or "pretty".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Append one CSV metadata row per ingested frame.
    #[serde(default)]
    pub frame_log: bool,

    /// Maximum accepted upload body size in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            data_dir: default_data_dir(),
            token: String::new(),
            max_keep: default_max_keep(),
            log_format: default_log_format(),
            frame_log: false,
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:8787".to_string()
}

fn default_data_dir() -> String {
    "/var/lib/framevault".to_string()
}

fn default_max_keep() -> usize {
    2000
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

/// Parse a size like "10M", "512K", "1G", or plain bytes.
pub fn parse_size(s: &str) -> Result<usize, String> {
    let s = s.trim();
    let (num, multiplier) = match s.as_bytes().last() {
        Some(b'k' | b'K') => (&s[..s.len() - 1], 1024usize),
        Some(b'm' | b'M') => (&s[..s.len() - 1], 1024 * 1024),
        Some(b'g' | b'G') => (&s[..s.len() - 1], 1024 * 1024 * 1024),
        _ => (s, 1),
    };
    let n: usize = num
        .trim()
        .parse()
        .map_err(|_| format!("invalid size: '{s}'"))?;
    n.checked_mul(multiplier)
        .ok_or_else(|| format!("size too large: '{s}'"))
}
