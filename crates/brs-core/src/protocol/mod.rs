//! Wire protocol: envelopes, codec and error taxonomy

pub mod codec;
pub mod envelope;
pub mod error;

pub use codec::{Codec, Decoded, Frame};
pub use envelope::{
    ERROR_MESSAGE_TYPE, Envelope, ErrorObject, Flavor, JSONRPC_VERSION, Outgoing,
    RESULT_MESSAGE_TYPE, RESULT_NOTIFICATION_METHOD, RequestId, record_message,
};
pub use error::{ErrorCode, ProtocolError};
