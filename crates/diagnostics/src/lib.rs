//! Lightweight, configurable logging for the sluice microservices.
//!
//! Usage:
//! - Set SLUICE_LOG=off (default) - no logs
//! - Set SLUICE_LOG=info - basic operation logs
//! - Set SLUICE_LOG=debug - detailed diagnostic logs

use std::sync::Once;

// Re-export emit so macros can use it
pub use emit;

static INIT: Once = Once::new();

/// Initialize diagnostics based on the SLUICE_LOG environment variable.
///
/// Call once at process startup. Safe to call multiple times - subsequent
/// calls are ignored.
pub fn init_diagnostics() {
    INIT.call_once(|| {
        let log_level = std::env::var("SLUICE_LOG").unwrap_or_else(|_| "off".to_string());

        let rt = match log_level.as_str() {
            "off" => return, // No setup needed
            "debug" => emit::setup()
                .emit_to(emit_term::stderr())
                .emit_when(emit::level::min_filter(emit::Level::Debug))
                .init(),
            "info" => emit::setup()
                .emit_to(emit_term::stderr())
                .emit_when(emit::level::min_filter(emit::Level::Info))
                .init(),
            "warn" => emit::setup()
                .emit_to(emit_term::stderr())
                .emit_when(emit::level::min_filter(emit::Level::Warn))
                .init(),
            "error" => emit::setup()
                .emit_to(emit_term::stderr())
                .emit_when(emit::level::min_filter(emit::Level::Error))
                .init(),
            _ => {
                let rt = emit::setup()
                    .emit_to(emit_term::stderr())
                    .emit_when(emit::level::min_filter(emit::Level::Info))
                    .init();
                eprintln!("Warning: Unknown SLUICE_LOG value '{}', using 'info'", log_level);
                rt
            }
        };

        // The runtime must outlive every log call in the process
        std::mem::forget(rt);
    });
}

/// Logging macros.
///
/// These are re-exports of `emit`'s level macros under project-local names:
/// - `log_info!` — basic operations (scans, commits, marker writes, etc.)
/// - `log_debug!` — detailed diagnostics (row counts, rendered statements, skip reasons)
/// - `log_warn!` — warning conditions (fallbacks, retries, recoverable oddities)
/// - `log_error!` — critical error conditions (failed loads, failed marker writes)
///
/// They are re-exported directly rather than wrapped in `macro_rules!` so that
/// `emit`'s implicit template capture (e.g. `log_info!("processing {key}")`)
/// resolves identifiers at the call site; forwarding through a wrapper macro
/// breaks that capture due to macro hygiene.
pub use emit::{debug as log_debug, error as log_error, info as log_info, warn as log_warn};

/// Re-export the init function for convenience
pub use init_diagnostics as init;
