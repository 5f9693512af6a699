//! Human-readable byte formatting.

const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Format a byte count using 1024-based units, one decimal place.
///
/// # Arguments
/// * `size` - Byte count
pub fn format_bytes(size: u64) -> String {
    let mut value: f64 = size as f64;
    for unit in UNITS {
        if value < 1024.0 {
            return format!("{:.1} {}", value, unit);
        }
        value /= 1024.0;
    }
    format!("{:.1} PB", value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_sizes_in_bytes() {
        assert_eq!(format_bytes(0), "0.0 B");
        assert_eq!(format_bytes(512), "512.0 B");
    }

    #[test]
    fn test_unit_ladder() {
        assert_eq!(format_bytes(1024), "1.0 KB");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.0 GB");
    }
}
