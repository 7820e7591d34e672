use indicatif::ProgressStyle;
use tracing::{Span, info_span};
use tracing_indicatif::span_ext::IndicatifSpanExt;

const FRAMES: &[&str] = &[
    "▁▁▁▁▁",
    "▁▂▂▂▁",
    "▁▄▂▄▁",
    "▂▄▆▄▂",
    "▄▆█▆▄",
    "▂▄▆▄▂",
    "▁▄▂▄▁",
    "▁▂▂▂▁",
];

/// A span shown as a spinner on stderr for as long as it is entered.
pub fn discovery_span(message: &str) -> Span {
    let span = info_span!("discovery", indicatif.pb_show = true);
    if let Ok(style) = ProgressStyle::with_template("{spinner:.blue} {msg} {elapsed:.dim}") {
        span.pb_set_style(&style.tick_strings(FRAMES));
    }
    span.pb_set_message(message);
    span
}
