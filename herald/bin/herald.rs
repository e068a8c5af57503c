use std::sync::Arc;

use herald_provider::{MemoryEmailTransport, MemorySmsTransport};

#[cfg(not(any(target_os = "macos", unix)))]
compile_error!("Only macos and unix are currently supported");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = herald::config::find_config_file()?;
    let config_content = std::fs::read_to_string(&config_path).map_err(|e| {
        anyhow::anyhow!(
            "Failed to read config from {}: {}",
            config_path.display(),
            e
        )
    })?;
    let config = herald::HeraldConfig::from_toml(&config_content)?;

    // Single-node transports; deployments wire the provider SDK bindings
    // here instead
    herald::Herald::new(config)
        .run(
            Arc::new(MemoryEmailTransport::new()),
            Arc::new(MemorySmsTransport::new()),
        )
        .await
}
