//! Domain layer: request canonicalisation and time window rules.

pub mod request;
pub mod time_window;

pub use request::{
    NotarisationPayload, NotarisationRequest, NotarisationRequestSignature, NotarisationResponse,
    NotarisedTransaction, NotaryReply,
};
pub use time_window::validate_time_window;
