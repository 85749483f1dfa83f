//! Debug logging of every processed envelope

use tracing::debug;

use crate::mta::handler::Handler;
use crate::smtp::envelope::Envelope;

/// Logs the envelope at debug level and leaves it as it is
#[derive(Debug, Clone, Copy, Default)]
pub struct Diagnostic;

impl Handler for Diagnostic {
    fn handle(&self, envelope: &mut Envelope) {
        let from = envelope
            .from
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        let to: Vec<String> = envelope.to.iter().map(ToString::to_string).collect();

        debug!(
            session_id = %envelope.session_id,
            ip = %envelope.ip,
            "from: {from}, to: {}, body ({} bytes):\n{}",
            to.join(", "),
            envelope.data_size(),
            String::from_utf8_lossy(&envelope.data)
        );
    }
}
