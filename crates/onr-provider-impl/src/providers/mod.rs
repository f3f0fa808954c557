//! One submodule per built-in upstream, plus the small shared helpers they
//! all lean on (`http_client` for ctx-scoped clients, `oauth_common` for the
//! manual-code/callback-url dance every OAuth provider repeats).

pub(crate) mod http_client;
pub(crate) mod oauth_common;

pub mod aistudio;
pub mod antigravity;
pub mod claude;
pub mod claudecode;
pub mod codex;
pub mod custom;
pub mod deepseek;
pub mod geminicli;
pub mod nvidia;
pub mod openai;
pub mod vertex;
pub mod vertexexpress;

pub use aistudio::AIStudioProvider;
pub use antigravity::AntigravityProvider;
pub use claude::ClaudeProvider;
pub use claudecode::ClaudeCodeProvider;
pub use codex::CodexProvider;
pub use custom::CustomProvider;
pub use deepseek::DeepSeekProvider;
pub use geminicli::GeminiCliProvider;
pub use nvidia::NvidiaProvider;
pub use openai::OpenAIProvider;
pub use vertex::VertexProvider;
pub use vertexexpress::VertexExpressProvider;
