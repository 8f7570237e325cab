//! mmembed server: OpenAI-compatible multimodal embeddings over HTTP.
//!
//! Configuration comes from `mmembed.{toml,yaml,json}`, `MMEMBED__*` and the
//! legacy deployment variables; pass a file path as the only argument to use
//! it instead of the default lookup.

use mmembed::EngineConfig;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match std::env::args_os().nth(1) {
        Some(path) => EngineConfig::load_from(std::path::Path::new(&path))?,
        None => EngineConfig::load()?,
    };

    mmembed::server::start_server(config).await?;

    Ok(())
}
