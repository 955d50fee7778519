use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StoreError {
    #[snafu(display("failed to connect to key-value store at {}: {}", uri, source))]
    Connect { uri: String, source: redis::RedisError },
    #[snafu(display("key-value store command against {} failed: {}", key, source))]
    Command { key: String, source: redis::RedisError },
}
