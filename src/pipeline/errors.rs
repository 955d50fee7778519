use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PipelineError {
    #[snafu(display("upstream {} did not reply within the configured timeout", upstream))]
    UpstreamTimeout { upstream: String },
    #[snafu(display("upstream {} I/O error: {}", upstream, source))]
    UpstreamIo {
        upstream: String,
        source: std::io::Error,
    },
    #[snafu(display("upstream {} sent an unparseable reply: {}", upstream, source))]
    UpstreamMalformed {
        upstream: String,
        source: hickory_proto::error::ProtoError,
    },
}
