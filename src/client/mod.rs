mod error;
mod helper;
mod models;
mod printer;
mod transport;

pub use error::{HelperError, TransportError};
pub use helper::{verb, Call, RequestHelper};
pub use models::{
    ApiVersion, CacheDirective, FileAttachment, Headers, OutgoingRequest, Payload,
    RequestDescriptor, ResponseBody, ResponseEnvelope, SentRequest,
};
pub use printer::{describe_exchange, mask_sensitive, pretty_json, MASK};
pub use transport::{ReqwestTransport, Transport, DEFAULT_RETRIES};
