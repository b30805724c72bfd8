//! Wire protocol: fixed-width text frames and the messages built from them.
//!
//! # Architecture
//!
//! - **frame**: length prefix, service field and status heuristic
//! - **message**: call/response/control builders and request classification

pub mod frame;
pub mod message;

pub use frame::{decode, encode, Frame, ServiceName, Status};
pub use message::{
    create_call_request, create_registration, create_response, create_unregistration,
    parse_request, parse_response, CallResponse, Request,
};
