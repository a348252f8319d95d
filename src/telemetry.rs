use crate::prelude::Result;
use tracing::subscriber::set_global_default;
use tracing::{Level, Subscriber};
use tracing_log::LogTracer;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{EnvFilter, fmt::MakeWriter};

/// Log targets used by the crate: `client` for HTTP traffic, `task` for
/// task polling, `list` for pagination, `ops` for module outcomes, `config`
/// for settings resolution, `upload` for image streaming and `cli` for the
/// `ntnx` binary.
pub const TARGETS: &[&str] = &["client", "task", "list", "ops", "config", "upload", "cli"];

/// Filter directives used when `RUST_LOG` is not set: the crate's own
/// targets at `max_level`, everything else (hyper, reqwest) at `warn`.
///
fn default_directives(max_level: Level) -> String {
    let level = max_level.as_str().to_lowercase();
    TARGETS.iter().fold(String::from("warn"), |mut directives, target| {
        directives.push_str(&format!(",{}={}", target, level));
        directives
    })
}

/// Composes the subscriber that logs one module invocation.
///
/// # Arguments
///
/// * `max_level`: Level of the crate's targets if the `RUST_LOG`
///   environment variable is not set.
/// * `sink`: Destination where logs will be written to. The `ntnx` binary
///   passes stderr, so stdout carries only the result document.
///
/// # Returns
///
/// `Subscriber` instance.
///
pub fn get_subscriber<Sink>(max_level: Level, sink: Sink) -> impl Subscriber + Sync + Send
where
    Sink: for<'a> MakeWriter<'a> + Sync + Send + 'static,
{
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_error| EnvFilter::new(default_directives(max_level)));

    // Compact lines when debugging a module by hand, JSON lines for
    // automation that collects stderr.
    #[cfg(debug_assertions)]
    let subscriber_builder = tracing_subscriber::fmt().compact();
    #[cfg(not(debug_assertions))]
    let subscriber_builder = tracing_subscriber::fmt().json().with_current_span(true);

    subscriber_builder
        .with_env_filter(env_filter)
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(sink)
        .finish()
}

/// Installs the subscriber for the rest of the process, bridging records
/// from `log`-based dependencies into it.
///
/// # Warning
///
/// A second call fails with [`crate::prelude::Error::Logger`] or
/// [`crate::prelude::Error::Telemetry`].
///
pub fn init_subscriber(subscriber: impl Subscriber + Sync + Send) -> Result<()> {
    LogTracer::init()?;

    set_global_default(subscriber)?;
    Ok(())
}
