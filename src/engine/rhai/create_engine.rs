use rhai::{Dynamic, Engine, EvalAltResult, Map};

use crate::{config::RhaiConfig, models::event::to_pretty_json};

/// Creates a Rhai engine with security features and custom configurations.
pub fn create_engine(rhai_config: RhaiConfig) -> Engine {
    let mut engine = Engine::new();

    // Apply security limits
    engine.set_max_operations(rhai_config.max_operations);
    engine.set_max_call_levels(rhai_config.max_call_levels);
    engine.set_max_string_size(rhai_config.max_string_size);
    engine.set_max_array_size(rhai_config.max_array_size);
    engine.set_max_map_size(rhai_config.max_map_size);

    // Disable dangerous language features
    const DANGEROUS_SYMBOLS: &[&str] = &[
        "eval", "import", "export", "print", "debug", "File", "file", "http", "net", "system",
        "process", "thread", "spawn",
    ];
    for &symbol in DANGEROUS_SYMBOLS {
        engine.disable_symbol(symbol);
    }

    engine.register_fn("json_format", json_format);

    engine
}

/// Renders a map as pretty JSON, for policies that rewrite an event's text.
fn json_format(map: Map) -> Result<String, Box<EvalAltResult>> {
    to_pretty_json(&Dynamic::from_map(map)).map_err(|e| format!("json_format failed: {e}").into())
}
