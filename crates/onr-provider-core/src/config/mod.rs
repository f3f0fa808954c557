mod dispatch;
mod model_table;
mod provider_config;

pub use dispatch::{DispatchRule, DispatchTable, OperationKind};
pub use model_table::{ModelRecord, ModelTable};
pub use provider_config::{
    AIStudioConfig, AntigravityConfig, ClaudeCodeConfig, ClaudeCodePreludeText, ClaudeConfig,
    CodexConfig, CountTokensMode, CustomProviderConfig, DeepSeekConfig, GeminiCliConfig,
    NvidiaConfig, OpenAIConfig, ProviderConfig, VertexConfig, VertexExpressConfig,
};
