pub mod config;
pub mod presenter;
pub mod types;

pub use types::Envelope;

use config::OutputConfig;
use presenter::Emitter;

pub fn emit(env: &Envelope) -> anyhow::Result<()> {
    let emitter = Emitter::from_config(OutputConfig::from_env());
    emitter.emit(env).map_err(anyhow::Error::from)
}
