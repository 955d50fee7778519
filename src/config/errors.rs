use snafu::Snafu;
use validator::ValidationErrors;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    #[snafu(display("missing required option: {}", option))]
    MissingRequired { option: String },
    #[snafu(display("invalid value for option {}: {}", option, reason))]
    InvalidValue { option: String, reason: String },
    #[snafu(display("config failed validation: {}", source))]
    Validation { source: ValidationErrors },
    #[snafu(display("failed to persist runtime snapshot at {}: {}", path, source))]
    Snapshot {
        path: String,
        source: std::io::Error,
    },
}
