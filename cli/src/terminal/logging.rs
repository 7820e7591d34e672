use colored::*;
use tracing::{Event, Level, Subscriber};
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::FormatEvent;
use tracing_subscriber::fmt::format::{self, Writer};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

/// Events on this target are printed verbatim, without a level symbol.
pub const PRINT_TARGET: &str = "lanscope::print";

/// Noisy dependencies are capped at `warn` unless `RUST_LOG` says otherwise.
const QUIET_DEPS: &str = "hyper=warn,reqwest=warn,rustls=warn";

pub struct LanscopeFormatter;

impl<S, N> FormatEvent<S, N> for LanscopeFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> format::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let meta = event.metadata();

        if meta.target() != PRINT_TARGET {
            let (symbol, color_func): (&str, fn(ColoredString) -> ColoredString) = match *meta.level() {
                Level::TRACE => ("[ ]", |s| s.dimmed()),
                Level::DEBUG => ("[?]", |s| s.blue()),
                Level::INFO => ("[+]", |s| s.green().bold()),
                Level::WARN => ("[*]", |s| s.yellow().bold()),
                Level::ERROR => ("[-]", |s| s.red().bold()),
            };
            write!(writer, "{} ", color_func(symbol.into()))?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

fn filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { "info" };
        EnvFilter::new(format!("{level},{QUIET_DEPS}"))
    })
}

/// Installs the global subscriber. Log lines go to stderr through the
/// progress layer so they never tear the spinner; stdout stays reserved
/// for the topology document.
pub fn init(verbose: bool) {
    let indicatif_layer = IndicatifLayer::new();

    let fmt_layer = tracing_subscriber::fmt::layer()
        .event_format(LanscopeFormatter)
        .with_writer(indicatif_layer.get_stderr_writer());

    tracing_subscriber::registry()
        .with(filter(verbose))
        .with(fmt_layer)
        .with(indicatif_layer)
        .init();
}
