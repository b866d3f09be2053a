use async_trait::async_trait;

use crate::error::HandlerError;
use crate::stage::Stage;

/// The work of one pipeline stage against a borrowed client.
///
/// `run` may be called several times for one saga execution when attempts
/// are retried, each time with a freshly borrowed client, so it takes its
/// input by reference.
#[async_trait]
pub trait StageHandler: Send + Sync {
    type Client: Send + Sync + 'static;
    type Input: Clone + Send + Sync + 'static;
    type Output: Clone + Send + Sync + 'static;

    fn stage(&self) -> Stage;

    /// # Errors
    ///
    /// Returns the remote call's error; its text drives retry classification.
    async fn run(
        &self,
        client: &Self::Client,
        input: &Self::Input,
    ) -> Result<Self::Output, HandlerError>;

    /// Reverse the effect of a successful `run`. Read-only stages keep the
    /// default no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the effect could not be reversed.
    async fn undo(&self, client: &Self::Client, output: &Self::Output) -> Result<(), HandlerError> {
        let _ = (client, output);
        Ok(())
    }
}
