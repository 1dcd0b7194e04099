//! Display formatting helpers

/// Format a duration in whole seconds as `H:MM:SS`, or `M:SS` under an hour
pub fn format_duration(seconds: u64) -> String {
    let h = seconds / 3600;
    let m = (seconds % 3600) / 60;
    let s = seconds % 60;
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}

/// Same as [`format_duration`] for millisecond inputs (episode data)
pub fn format_duration_ms(millis: u64) -> String {
    format_duration(millis / 1000)
}
