use snafu::Snafu;

use crate::plugins::errors::PluginError;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum BuilderError {
    #[snafu(display("failed to build plugin {}: {}", name, source))]
    PluginBuild { source: PluginError, name: String },
}
