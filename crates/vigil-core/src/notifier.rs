//! The narrow interface back to chat transports.
//!
//! Listeners (telegram, email) live outside the core and reach the loop
//! only through `enqueue_chat`/`wake`. In the other direction the loop
//! holds nothing but this trait object, used to push replies out to the
//! transport that asked.

use async_trait::async_trait;

use vigil_types::Result;

/// Pushes an outbound reply to a chat transport.
#[async_trait]
pub trait ChannelNotifier: Send + Sync {
    /// Deliver `text` to the creator. `voice` asks the transport to
    /// synthesize audio where it can; transports without voice support
    /// fall back to text.
    async fn send_reply(&self, text: &str, voice: bool) -> Result<()>;
}
