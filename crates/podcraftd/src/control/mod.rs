//! JSONL control protocol spoken on the control socket.
//!
//! A client sends one line such as `{"intent":{"kind":"snapshot"}}` and
//! reads one line back, for example `{"outcome":"completed","detail":{...}}`.

mod errors;
mod handler;
mod request;
mod response;

pub use errors::ControlError;
pub use handler::ControlConnectionHandler;
pub use request::ControlRequest;
pub use response::{ControlResponse, ErrorBody, ResponseWriter};

const CONTROL_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::control");
