//! Wires every built-in `UpstreamProvider` into an `onr_provider_core::ProviderRegistry`.

use std::sync::Arc;

use onr_provider_core::ProviderRegistry;

use crate::providers::{
    AIStudioProvider, AntigravityProvider, ClaudeCodeProvider, ClaudeProvider, CodexProvider,
    DeepSeekProvider, GeminiCliProvider, NvidiaProvider, OpenAIProvider, VertexExpressProvider,
    VertexProvider,
};

/// Registers the fixed set of built-in providers. `custom` providers are
/// instantiated per-row by the host from `CustomProviderConfig`, not here.
pub fn register_builtin_providers(registry: &mut ProviderRegistry) {
    registry.register(Arc::new(OpenAIProvider::new()));
    registry.register(Arc::new(ClaudeProvider::new()));
    registry.register(Arc::new(AIStudioProvider::new()));
    registry.register(Arc::new(VertexExpressProvider::new()));
    registry.register(Arc::new(VertexProvider::new()));
    registry.register(Arc::new(GeminiCliProvider::new()));
    registry.register(Arc::new(ClaudeCodeProvider::new()));
    registry.register(Arc::new(CodexProvider::new()));
    registry.register(Arc::new(AntigravityProvider::new()));
    registry.register(Arc::new(NvidiaProvider::new()));
    registry.register(Arc::new(DeepSeekProvider::new()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_every_builtin_provider_under_its_own_name() {
        let mut registry = ProviderRegistry::new();
        register_builtin_providers(&mut registry);
        for name in [
            "openai",
            "claude",
            "aistudio",
            "vertexexpress",
            "vertex",
            "geminicli",
            "claudecode",
            "codex",
            "antigravity",
            "nvidia",
            "deepseek",
        ] {
            assert!(registry.get(name).is_some(), "missing provider {name}");
        }
    }
}
