// Medicaid Billing - Core Library
// Shared by the CLI, the API server and tests

pub mod codes;
pub mod config;
pub mod db;
pub mod encoder;
pub mod error;
pub mod export;
pub mod models;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use codes::{validate_code, ServiceKind, TRIP_CODES, WORK_CODES};
pub use config::{AppConfig, ContractConstants};
pub use db::{
    clear_billing_entries, delete_recipient, delete_schedule, get_events_for_entity,
    get_recipient, insert_billing_entries, insert_event, insert_recipient, insert_schedule,
    list_billing_entries, list_recipients, list_schedules, open_database, record_export,
    setup_database, Event,
};
pub use encoder::{encode_entry, FIXED_FIELDS_WIDTH, LAYOUT, RECORD_LENGTH};
pub use error::{BillingError, Result};
pub use export::{
    export, export_filename, generate_lines, render, stage, write_to_dir, ExportFile,
    ExportReport, SkippedEntry,
};
pub use models::{
    billing_week, parse_units, BillingDate, BillingEntry, NewRecipient, NewSchedule,
    RawBillingEntry, Recipient, ScheduleEntry, Weekday,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Install the fmt subscriber used by both binaries.
///
/// `RUST_LOG` overrides `default_filter`.
pub fn init_tracing(default_filter: &str) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
