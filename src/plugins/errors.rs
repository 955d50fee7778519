use snafu::prelude::*;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PluginError {
    #[snafu(display("failed to parse plugin config: {}, error: {}", name, source))]
    ConfigErr {
        source: serde_json::Error,
        name: String,
    },
    #[snafu(display("{} requires a {} peer, but none was constructed before it", name, peer))]
    MissingPeer { name: String, peer: String },
}
