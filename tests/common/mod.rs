use std::path::Path;

use heartbeat_logger::app::App;
use heartbeat_logger::args::TopLevelCmd;
use heartbeat_logger::errors::AppError;
use tokio_util::sync::CancellationToken;

/// Builds the app against a config from `tests/test_configs`, never saving over it.
#[allow(dead_code)]
pub fn build_app(
    config_name: &str,
    working_dir: &Path,
    parent_token: CancellationToken,
) -> Result<App, AppError> {
    let arg_config = TopLevelCmd {
        config_override: Some(format!("tests/test_configs/{config_name}").into()),
        config_required: true,
        no_save: true,
        subcommands: None,
    };
    App::build(&arg_config, working_dir, parent_token)
}
