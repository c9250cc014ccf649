//! The blocking bridge: start an asynchronous task, park the caller, hand
//! the callback's result back.
//!
//! # Design
//! Every bridged call allocates its own [`ResultCell`] and
//! [`CompletionGate`]. The completion closure given to the transport owns a
//! clone of both: it writes the cell and only then signals the gate. The
//! caller waits on the gate and reads the cell afterwards, so the cell has
//! exactly one writer and one reader separated by the gate's ordering.
//!
//! The completion is a boxed `FnOnce`, so a transport cannot invoke it
//! twice. The cell also refuses a second write and the gate ignores a second
//! signal.
//!
//! # Deadlock hazard
//! [`block_on_completion`] blocks the calling thread without a timeout. If
//! the transport needs that same thread to deliver the callback (a
//! single-threaded executor driving the transport, for example), the call
//! never returns. Nothing here detects that situation.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{trace, warn};

use crate::gate::CompletionGate;
use crate::http::HttpResponse;

/// Callback handed to a transport: `(value, response, error)`, at most once.
pub type Completion<T, E> =
    Box<dyn FnOnce(Option<T>, Option<HttpResponse>, Option<E>) + Send + 'static>;

/// The tri-part result of one transfer.
///
/// By the transport's contract exactly one of `value` and `error` is set.
/// `response` is independent of that and may be present either way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome<T, E> {
    pub value: Option<T>,
    pub response: Option<HttpResponse>,
    pub error: Option<E>,
}

impl<T, E> Outcome<T, E> {
    pub fn new(value: Option<T>, response: Option<HttpResponse>, error: Option<E>) -> Self {
        Self {
            value,
            response,
            error,
        }
    }

    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn response(&self) -> Option<&HttpResponse> {
        self.response.as_ref()
    }

    pub fn error(&self) -> Option<&E> {
        self.error.as_ref()
    }

    /// True when the transport reported no error.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Split into the `(value, response, error)` triple, as delivered.
    pub fn into_parts(self) -> (Option<T>, Option<HttpResponse>, Option<E>) {
        (self.value, self.response, self.error)
    }

    /// The error if there is one, otherwise the value as delivered.
    pub fn into_result(self) -> Result<Option<T>, E> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.value),
        }
    }
}

enum Slot<T> {
    Empty,
    Filled(T),
    Taken,
}

/// Write-once, read-once container shared between a completion and its
/// caller.
pub struct ResultCell<T> {
    slot: Mutex<Slot<T>>,
}

impl<T> ResultCell<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot::Empty),
        }
    }

    /// Store `value`. Hands it back if the cell was written before.
    pub fn put(&self, value: T) -> Result<(), T> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        match *slot {
            Slot::Empty => {
                *slot = Slot::Filled(value);
                Ok(())
            }
            Slot::Filled(_) | Slot::Taken => Err(value),
        }
    }

    /// Remove the stored value. `None` if nothing was written or it was
    /// already taken.
    pub fn take(&self) -> Option<T> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        match std::mem::replace(&mut *slot, Slot::Taken) {
            Slot::Filled(value) => Some(value),
            Slot::Empty => {
                *slot = Slot::Empty;
                None
            }
            Slot::Taken => None,
        }
    }
}

impl<T> Default for ResultCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Run `start` with a fresh completion and block until it fires.
///
/// `start` receives the completion and is expected to hand it to a
/// transport and return promptly. The outcome is returned exactly as the
/// completion received it.
pub fn block_on_completion<T, E, S>(start: S) -> Outcome<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
    S: FnOnce(Completion<T, E>),
{
    let cell = Arc::new(ResultCell::new());
    let gate = Arc::new(CompletionGate::new());

    let completion: Completion<T, E> = {
        let cell = Arc::clone(&cell);
        let gate = Arc::clone(&gate);
        Box::new(move |value, response, error| {
            if cell.put(Outcome::new(value, response, error)).is_err() {
                warn!("completion delivered twice; keeping the first outcome");
                return;
            }
            trace!("completion stored, signaling gate");
            gate.signal();
        })
    };

    start(completion);

    trace!("waiting for completion");
    gate.wait();

    cell.take().unwrap_or_else(|| {
        warn!("gate signaled without a stored outcome");
        Outcome::new(None, None, None)
    })
}
