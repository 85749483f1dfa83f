//! Processing stages and the chain that runs them

use std::fmt;

use crate::smtp::envelope::Envelope;

/// One processing stage of an accepted message.
///
/// A handler may inspect or rewrite the envelope. It has no way to fail the
/// message: faults are logged and the next handler runs regardless.
pub trait Handler: Send + Sync {
    fn handle(&self, envelope: &mut Envelope);
}

impl<F> Handler for F
where
    F: Fn(&mut Envelope) + Send + Sync,
{
    fn handle(&self, envelope: &mut Envelope) {
        self(envelope)
    }
}

/// Handlers run one after the other, in registration order, on the calling
/// thread
#[derive(Default)]
pub struct Chain {
    handlers: Vec<Box<dyn Handler>>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler, builder style
    pub fn with(mut self, handler: impl Handler + 'static) -> Self {
        self.push(handler);
        self
    }

    /// Append a handler
    pub fn push(&mut self, handler: impl Handler + 'static) {
        self.handlers.push(Box::new(handler));
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Handler for Chain {
    fn handle(&self, envelope: &mut Envelope) {
        for handler in &self.handlers {
            handler.handle(envelope);
        }
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}
