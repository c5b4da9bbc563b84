use heartbeat_logger::args::TopLevelCmd;
use heartbeat_logger::errors::AppError;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    heartbeat_logger::initialize_panic_handler();
    let arg_config: TopLevelCmd = argh::from_env();

    let parent_token = CancellationToken::new();
    let ctrl_c_token = parent_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_token.cancel();
        }
    });

    heartbeat_logger::run(arg_config, parent_token).await
}
