//! Utility functions and helpers

/// Number of hash slots in a Redis cluster
pub const CLUSTER_SLOTS: u16 = 16384;

/// Calculate CRC16 checksum (XMODEM variant used for Redis slot calculation)
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for byte in data {
        crc ^= (*byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// Extract the hash tag from a key.
///
/// Only the section between the first `{` and the next `}` counts, and only
/// when it is non-empty; otherwise the whole key is hashed.
pub fn extract_hash_tag(key: &str) -> &str {
    if let Some(start) = key.find('{') {
        if let Some(len) = key[start + 1..].find('}') {
            if len > 0 {
                return &key[start + 1..start + 1 + len];
            }
        }
    }
    key
}

/// Cluster slot owning `key`
pub fn key_slot(key: &str) -> u16 {
    crc16(extract_hash_tag(key).as_bytes()) % CLUSTER_SLOTS
}

/// Format duration for human-readable output
pub fn format_duration(duration: std::time::Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}.{:03}s", secs, duration.subsec_millis())
    } else if secs < 3600 {
        format!("{}m{}s", secs / 60, secs % 60)
    } else {
        format!("{}h{}m{}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
