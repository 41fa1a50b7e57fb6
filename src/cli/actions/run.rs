use super::{create, rotate, server, token, Action};
use crate::cli::telemetry;
use anyhow::Result;

pub(super) async fn execute(action: Action) -> Result<()> {
    let result = match action {
        Action::Server(args) => server::execute(args).await,
        Action::Rotate(args) => rotate::execute(args).await,
        Action::CreateCode(args) => create::execute(args).await,
        Action::StaticToken(args) => token::execute(&args),
    };

    telemetry::shutdown_tracer();

    result
}
