//! Default value functions used by serde for config deserialization.

pub fn default_host() -> String {
    "0.0.0.0".to_string()
}

pub fn default_port() -> u16 {
    3000
}

pub fn default_session_dir() -> String {
    "whatsapp_session".to_string()
}

pub fn default_device_name() -> String {
    "wagate".to_string()
}

pub fn default_snapshot_file() -> String {
    "groups.json".to_string()
}

pub fn default_refresh_delay_ms() -> u64 {
    2000
}

pub fn default_reconnect_delay_ms() -> u64 {
    0
}

pub fn default_log_level() -> String {
    "info".to_string()
}
