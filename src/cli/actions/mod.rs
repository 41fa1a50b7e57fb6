pub mod create;
pub mod rotate;
pub mod server;
pub mod store;
pub mod token;

// Internal "interpreter" for `Action`.
mod run;

#[derive(Debug)]
pub enum Action {
    Server(server::Args),
    Rotate(rotate::Args),
    CreateCode(create::Args),
    StaticToken(token::Args),
}

impl Action {
    /// Execute the action.
    /// # Errors
    /// Returns an error if the action fails.
    pub async fn execute(self) -> anyhow::Result<()> {
        run::execute(self).await
    }
}
