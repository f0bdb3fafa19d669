use chrono::NaiveDateTime;

/// Format a duration in seconds to "Xh Ym" or "Ym" string
pub fn format_duration_secs(secs: i64) -> String {
    if secs <= 0 {
        return "now".to_string();
    }
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

/// Format a timestamp to "HH:MM"
pub fn format_time(t: NaiveDateTime) -> String {
    t.format("%H:%M").to_string()
}

/// Scores always carry one decimal: "7.5", "10.0"
pub fn format_score(score: f64) -> String {
    format!("{:.1}", score)
}

/// Create a simple ASCII progress bar
pub fn progress_bar(filled: f64, total: f64, width: usize) -> String {
    if total <= 0.0 {
        return "░".repeat(width);
    }
    let ratio = (filled / total).clamp(0.0, 1.0);
    let filled_count = (ratio * width as f64).round() as usize;
    let empty_count = width.saturating_sub(filled_count);
    format!("{}{}", "█".repeat(filled_count), "░".repeat(empty_count))
}
