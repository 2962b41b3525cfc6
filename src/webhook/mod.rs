//! GitHub webhook handling: signature verification and event classification

pub mod event;
pub mod signature;

pub use event::{classify, WebhookAction, DELIVERY_HEADER, EVENT_HEADER};
pub use signature::{verify_signature, SIGNATURE_HEADER};
