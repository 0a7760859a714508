use async_trait::async_trait;

use super::error::OutputError;
use crate::models::notification::RenderedFields;

/// A delivery target: chat webhook, SIEM, script, console.
///
/// Outputs are shared between routes and may be called concurrently.
#[async_trait]
pub trait Output: Send + Sync {
    /// The configured name of the output.
    fn name(&self) -> &str;

    /// Short name of the output type, used in logs.
    fn kind(&self) -> &'static str;

    /// Prepares the output before its first delivery.
    async fn init(&self) -> Result<(), OutputError> {
        Ok(())
    }

    /// Delivers one set of rendered fields.
    async fn send(&self, fields: &RenderedFields) -> Result<(), OutputError>;

    /// Releases resources once no route references the output anymore.
    async fn terminate(&self) -> Result<(), OutputError> {
        Ok(())
    }
}
