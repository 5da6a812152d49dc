use async_trait::async_trait;

use crate::errors::PilotResult;

/// Image + prompt in, free text out.
///
/// Any failure (timeout, HTTP status, malformed or empty payload) is an
/// `Err`; the engine treats it the same as "no reply" and falls back.
#[async_trait]
pub trait VisionModel: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, image_jpeg: &[u8], prompt: &str) -> PilotResult<String>;
}
