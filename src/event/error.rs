use super::EventChannel;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum SubscriptionError {
    #[error("a handler is already subscribed to the {0} channel")]
    AlreadySubscribed(EventChannel),
}

/// Failure raised inside a user handler during dispatch.
///
/// Captured by the bus and reported out of band; it never unwinds into the
/// driver's notification context.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("handler for the {channel} channel failed: {source}")]
    Failed {
        channel: EventChannel,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("handler for the {channel} channel panicked")]
    Panicked { channel: EventChannel },
}

impl HandlerError {
    pub fn channel(&self) -> EventChannel {
        match self {
            Self::Failed { channel, .. } | Self::Panicked { channel } => *channel,
        }
    }
}
