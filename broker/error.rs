use im_transport::ChannelError;

/// Errors that abort the broker. Everything else is recovered locally.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("cannot set up control channel: {0}")]
    ControlChannel(#[source] ChannelError),

    #[error("invalid configuration: {0}")]
    Config(String),
}
