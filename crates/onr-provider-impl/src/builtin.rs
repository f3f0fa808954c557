//! The fixed list of providers every fresh install starts with. Seeded into
//! storage once, on first boot, so the admin surface always has something to
//! point credentials at; `custom` providers are user-authored and never
//! seeded here.

use onr_provider_core::ProviderConfig;
use onr_provider_core::config::{
    AIStudioConfig, AntigravityConfig, ClaudeCodeConfig, ClaudeConfig, CodexConfig, DeepSeekConfig,
    GeminiCliConfig, NvidiaConfig, OpenAIConfig, VertexConfig, VertexExpressConfig,
};

/// One row to insert into the `providers` table if it isn't already there.
pub struct BuiltinProviderSeed {
    pub name: &'static str,
    pub config_json: serde_json::Value,
    pub enabled: bool,
}

fn seed(name: &'static str, config: ProviderConfig, enabled: bool) -> BuiltinProviderSeed {
    let config_json =
        serde_json::to_value(config).expect("builtin provider config always serializes");
    BuiltinProviderSeed { name, config_json, enabled }
}

pub fn builtin_provider_seeds() -> Vec<BuiltinProviderSeed> {
    vec![
        seed("openai", ProviderConfig::OpenAI(OpenAIConfig::default()), true),
        seed("claude", ProviderConfig::Claude(ClaudeConfig::default()), true),
        seed("aistudio", ProviderConfig::AIStudio(AIStudioConfig::default()), true),
        seed(
            "vertexexpress",
            ProviderConfig::VertexExpress(VertexExpressConfig::default()),
            false,
        ),
        seed("vertex", ProviderConfig::Vertex(VertexConfig::default()), false),
        seed("geminicli", ProviderConfig::GeminiCli(GeminiCliConfig::default()), false),
        seed(
            "claudecode",
            ProviderConfig::ClaudeCode(ClaudeCodeConfig::default()),
            false,
        ),
        seed("codex", ProviderConfig::Codex(CodexConfig::default()), false),
        seed(
            "antigravity",
            ProviderConfig::Antigravity(AntigravityConfig::default()),
            false,
        ),
        seed("nvidia", ProviderConfig::Nvidia(NvidiaConfig::default()), false),
        seed("deepseek", ProviderConfig::DeepSeek(DeepSeekConfig::default()), true),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_cover_every_builtin_provider_name() {
        let names: Vec<&str> = builtin_provider_seeds().into_iter().map(|s| s.name).collect();
        for expected in [
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
            assert!(names.contains(&expected), "missing seed for {expected}");
        }
    }

    #[test]
    fn seed_config_json_round_trips_through_provider_config() {
        for seed in builtin_provider_seeds() {
            let parsed: ProviderConfig = serde_json::from_value(seed.config_json)
                .unwrap_or_else(|err| panic!("{}: {err}", seed.name));
            let _ = parsed;
        }
    }
}
