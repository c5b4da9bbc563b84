#![deny(unused_must_use)]

use std::path::{Path, PathBuf};

use rolling_file::{BasicRollingFileAppender, RollingConditionBasic};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{filter, prelude::*};
use tracing_subscriber::{fmt::time::ChronoLocal, layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(not(any(debug_assertions, feature = "portable")))]
use directories::BaseDirs;

pub mod app;
pub mod args;
pub mod collection;
pub mod errors;
pub mod heart_rate;
pub mod readout;
pub mod scan;
pub mod settings;
pub mod sink;

mod panic_handler;

pub use panic_handler::initialize_panic_handler;

use app::App;
use args::TopLevelCmd;
use errors::AppError;

/// Sets up the working directory and file logging, then runs whichever subcommand was given.
pub async fn run(arg_config: TopLevelCmd, parent_token: CancellationToken) -> Result<(), AppError> {
    let working_directory = determine_working_directory().ok_or(AppError::WorkDir)?;
    if !working_directory.exists() {
        tokio::fs::create_dir_all(&working_directory)
            .await
            .map_err(|e| AppError::CreateDir {
                path: working_directory.clone(),
                source: e,
            })?;
    }

    let app = App::build(&arg_config, &working_directory, parent_token)?;
    let _guard = init_logging(&working_directory, app.settings.get_log_level())?;

    info!("Starting app... v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded config from: {}", app.config_path.display());

    app.run(arg_config.subcommands.as_ref()).await?;

    info!("Shutting down gracefully...");
    Ok(())
}

/// Logs go to a size-rotated file next to the data, the returned guard flushes it on drop.
fn init_logging(working_directory: &Path, level: LevelFilter) -> Result<WorkerGuard, AppError> {
    let log_path = working_directory.join(format!("{}.log", env!("CARGO_PKG_NAME")));
    let file_appender = BasicRollingFileAppender::new(
        log_path,
        RollingConditionBasic::new().max_size(1024 * 1024 * 5),
        2,
    )?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let time_fmt = ChronoLocal::new("%Y-%m-%d %H:%M:%S%.6f".to_owned());
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_file(false)
        .with_ansi(false)
        .with_target(true)
        .with_timer(time_fmt)
        .with_line_number(true)
        .with_filter(level);
    // Allow everything through but limit btleplug to just info, since it spits out a bit too much while scanning
    let env_filter = filter::EnvFilter::new("trace,btleplug=info");
    if let Err(e) = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
    {
        eprintln!("Logging was already initialized: {e}");
    }
    Ok(guard)
}

/// Returns the directory that logs, config, and the CSV should be placed in by default.
// If the app is built with the portable feature, it will just return it's parent directory.
// If there is a config file present adjacent to the executable, the executable's parent path is returned.
// Otherwise, it will return the `directories` `data_dir` output.
//
// Debug builds are always portable. Release builds can optionally have the "portable" feature enabled.
fn determine_working_directory() -> Option<PathBuf> {
    let exe_path = std::env::current_exe().ok()?;
    let exe_parent = exe_path.parent()?.to_path_buf();
    let config_path = exe_path.with_extension("toml");

    if is_portable() || config_path.exists() {
        Some(exe_parent)
    } else {
        get_user_dir()
    }
}

#[cfg(any(debug_assertions, feature = "portable"))]
fn is_portable() -> bool {
    true
}

#[cfg(not(any(debug_assertions, feature = "portable")))]
fn is_portable() -> bool {
    false
}

#[cfg(any(debug_assertions, feature = "portable"))]
fn get_user_dir() -> Option<PathBuf> {
    None
}

#[cfg(not(any(debug_assertions, feature = "portable")))]
fn get_user_dir() -> Option<PathBuf> {
    let base_dirs = BaseDirs::new()?;
    Some(base_dirs.data_dir().join(env!("CARGO_PKG_NAME")))
}
