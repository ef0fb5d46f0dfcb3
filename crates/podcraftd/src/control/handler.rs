use std::time::Duration;

use tracing::{debug, warn};

use super::{CONTROL_TARGET, ControlError, ControlRequest, ControlResponse, ResponseWriter};
use crate::coordinator::CoordinatorHandle;
use crate::transport::{ConnectionHandler, ConnectionStream, read_request_line};

/// How long a client may take to send its request line.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Serves one control request per connection.
///
/// Intents run through the coordinator, so a connection waiting on a long
/// snapshot only blocks its own thread.
#[derive(Clone)]
pub struct ControlConnectionHandler {
    coordinator: CoordinatorHandle,
}

impl ControlConnectionHandler {
    /// Handler submitting to `coordinator`.
    #[must_use]
    pub fn new(coordinator: CoordinatorHandle) -> Self {
        Self { coordinator }
    }

    fn serve(&self, stream: &mut ConnectionStream) -> Result<(), ControlError> {
        stream.set_read_timeout(Some(REQUEST_TIMEOUT))?;
        let Some(line) = read_request_line(stream)? else {
            debug!(target: CONTROL_TARGET, "client disconnected without request");
            return Ok(());
        };
        let response = match ControlRequest::parse(&line) {
            Ok(request) => self.submit(request),
            Err(error) => {
                warn!(target: CONTROL_TARGET, error = %error, "malformed control request");
                ControlResponse::bad_request(&error)
            }
        };
        ResponseWriter::new(stream).write(&response)
    }

    fn submit(&self, request: ControlRequest) -> ControlResponse {
        debug!(target: CONTROL_TARGET, intent = request.intent.name(), wait = request.wait, "control request");
        if request.wait {
            self.coordinator.execute(request.intent).into()
        } else {
            let (accepted, _ticket) = self.coordinator.submit(request.intent);
            accepted.into()
        }
    }
}

impl ConnectionHandler for ControlConnectionHandler {
    fn handle(&self, mut stream: ConnectionStream) {
        if let Err(error) = self.serve(&mut stream) {
            warn!(target: CONTROL_TARGET, error = %error, "control connection failed");
        }
    }
}
