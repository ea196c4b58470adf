/// A message on the wire: an opaque body (codec output) plus a broker id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    /// Broker-assigned identifier, unique per queue.
    pub id: String,
    /// Serialized event payload.
    pub body: Vec<u8>,
}

impl Message {
    pub fn new(id: impl Into<String>, body: Vec<u8>) -> Self {
        Message {
            id: id.into(),
            body,
        }
    }
}

/// Handle for acknowledging a received message. Valid only until the
/// message's visibility timeout expires.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Receipt(pub(super) u64);

/// One delivery of a message to a consumer.
#[derive(Clone, Debug)]
pub struct Delivery {
    pub message: Message,
    pub receipt: Receipt,
    /// How many times this message has been received, this delivery
    /// included.
    pub receive_count: u32,
}
