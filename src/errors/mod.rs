use snafu::Snafu;

use crate::builder::errors::BuilderError;
use crate::config::errors::ConfigError;
use crate::store::errors::StoreError;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum AppError {
    #[snafu(display("configuration error: {}", source))]
    Config { source: ConfigError },
    #[snafu(display("plugin construction error: {}", source))]
    Builder { source: BuilderError },
    #[snafu(display("key-value store error: {}", source))]
    Store { source: StoreError },
    #[snafu(display("failed to bind listener: {}", source))]
    Listen { source: std::io::Error },
}
