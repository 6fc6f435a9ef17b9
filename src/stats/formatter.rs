//! Stats formatting for different output formats

use super::RequestStats;
use crate::config::StatsFormat;

/// Format stats according to the configured format
pub fn format_stats(stats: &RequestStats, format: StatsFormat) -> String {
    match format {
        StatsFormat::Compact => format_compact(stats),
        StatsFormat::Json => format_json(stats),
    }
}

fn format_compact(s: &RequestStats) -> String {
    format!(
        "← prompt_tokens={} turns={} fragments={} chars={} {:.1}ms {:.1} chars/s",
        s.prompt_tokens, s.turns_retained, s.fragments, s.output_chars, s.duration_ms, s.chars_per_sec
    )
}

fn format_json(s: &RequestStats) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "{}".to_string())
}
