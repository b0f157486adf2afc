const KB: f64 = 1024.0;
const MB: f64 = KB * 1024.0;
const GB: f64 = MB * 1024.0;

pub struct FileSizeUtils;

impl FileSizeUtils {
    /// Formats a byte count for display, always with two decimals except for
    /// the zero case. Missing or non-numeric input renders as `0 B`.
    pub fn format_size(bytes: Option<f64>) -> String {
        let bytes = match bytes {
            Some(b) if !b.is_nan() => b,
            _ => return "0 B".to_string(),
        };

        if bytes == 0.0 {
            "0 B".to_string()
        } else if bytes < KB {
            format!("{:.2} B", bytes)
        } else if bytes < MB {
            format!("{:.2} KB", bytes / KB)
        } else if bytes < GB {
            format!("{:.2} MB", bytes / MB)
        } else {
            format!("{:.2} GB", bytes / GB)
        }
    }

    pub fn format_bytes(bytes: u64) -> String {
        Self::format_size(Some(bytes as f64))
    }
}
