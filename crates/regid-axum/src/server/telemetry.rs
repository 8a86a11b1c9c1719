//! Console logging for the service.
//!
//! `RUST_LOG` selects what is shown (default `info`), for example:
//!
//! ```bash
//! RUST_LOG=regid=debug,tower_http=info regid-server --log-format json
//! ```
//!
//! At `debug`, every allocation attempt is logged with its candidate and the
//! maximum sequence seen in the scan.

use crate::server::config::LogFormat;
use tracing_subscriber::{
    EnvFilter, fmt, fmt::time::ChronoLocal, layer::SubscriberExt, util::SubscriberInitExt,
};

pub fn init_telemetry(format: LogFormat) -> anyhow::Result<()> {
    let registry = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()));

    match format {
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_thread_ids(true)
                    .with_line_number(true)
                    .with_target(false)
                    .with_timer(ChronoLocal::rfc_3339())
                    .with_file(true)
                    .pretty(),
            )
            .try_init()?,
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_timer(ChronoLocal::rfc_3339()),
            )
            .try_init()?,
    }
    Ok(())
}
