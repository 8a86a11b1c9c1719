use anyhow::bail;
use clap::{Parser, ValueEnum};
use core::time::Duration;
use regid::{
    Allocator, Backoff, BatchFailurePolicy, DEFAULT_MAX_ATTEMPTS, MemoryStore, RegistrationWriter,
    RetryPolicy, SystemClock, WriterConfig,
};

/// Console log layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Multi-line, human-readable output.
    Pretty,
    /// One JSON object per event, for log shippers.
    Json,
}

/// Runtime configuration for the `regid-server` binary.
///
/// All values are parsed from CLI arguments or environment variables (a `.env`
/// file is loaded first), with defaults matching the allocation behavior the
/// registration form has always had.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "regid-server",
    version,
    about = "An HTTP service for registering participants with unique IDs"
)]
pub struct CliArgs {
    /// Address to listen on.
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:8080"))]
    pub server_addr: String,

    /// Allocation attempts per participant before the batch fails.
    ///
    /// Environment variable: `MAX_ATTEMPTS`
    #[arg(long, env = "MAX_ATTEMPTS", default_value_t = DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: u32,

    /// Unit of the linear backoff between attempts, in milliseconds. `0`
    /// retries immediately.
    ///
    /// Environment variable: `BASE_DELAY_MS`
    #[arg(long, env = "BASE_DELAY_MS", default_value_t = 50)]
    pub base_delay_ms: u64,

    /// Wall-clock budget for one participant's allocation, in milliseconds.
    /// Unset means only `MAX_ATTEMPTS` bounds it.
    ///
    /// Environment variable: `ALLOCATION_DEADLINE_MS`
    #[arg(long, env = "ALLOCATION_DEADLINE_MS")]
    pub allocation_deadline_ms: Option<u64>,

    /// What to do with already committed participants when a later one in
    /// the same batch fails: `keep-committed` or `mark-abandoned`.
    ///
    /// Environment variable: `BATCH_FAILURE_POLICY`
    #[arg(long, env = "BATCH_FAILURE_POLICY", default_value_t = BatchFailurePolicy::KeepCommitted)]
    pub batch_failure_policy: BatchFailurePolicy,

    /// Environment variable: `LOG_FORMAT`
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Event name used in registration notices.
    ///
    /// Environment variable: `EVENT_NAME`
    #[arg(long, env = "EVENT_NAME", default_value_t = String::from("Teens & Kids Retreat"))]
    pub event_name: String,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_addr: String,
    pub retry: RetryPolicy,
    pub writer: WriterConfig,
    pub log_format: LogFormat,
    pub event_name: String,
}

impl ServerConfig {
    /// The writer every request shares, backed by a fresh in-memory store.
    pub fn build_writer(&self) -> RegistrationWriter<MemoryStore> {
        let allocator = Allocator::new(MemoryStore::new()).with_policy(self.retry);
        RegistrationWriter::new(allocator, SystemClock).with_config(self.writer.clone())
    }
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.max_attempts == 0 {
            bail!("MAX_ATTEMPTS must be greater than 0");
        }
        if args.allocation_deadline_ms == Some(0) {
            bail!("ALLOCATION_DEADLINE_MS must be greater than 0 when set");
        }

        let backoff = match args.base_delay_ms {
            0 => Backoff::None,
            ms => Backoff::Linear {
                base: Duration::from_millis(ms),
            },
        };

        Ok(Self {
            server_addr: args.server_addr,
            retry: RetryPolicy {
                max_attempts: args.max_attempts,
                backoff,
                deadline: args.allocation_deadline_ms.map(Duration::from_millis),
            },
            writer: WriterConfig {
                on_batch_failure: args.batch_failure_policy,
                ..WriterConfig::default()
            },
            log_format: args.log_format,
            event_name: args.event_name,
        })
    }
}
