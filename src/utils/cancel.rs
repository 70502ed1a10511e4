use tokio::sync::watch;

/// Receiving side of a cancellation request.
///
/// Long-running operations poll [`CancelSignal::is_cancelled`] between
/// steps. Clones observe the same request.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: Option<watch::Receiver<bool>>,
}

/// Sending side of a cancellation request
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelSignal {
    /// A signal that is never tripped
    pub fn never() -> Self {
        Self { rx: None }
    }

    /// Create a linked handle and signal
    pub fn channel() -> (CancelHandle, CancelSignal) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx }, CancelSignal { rx: Some(rx) })
    }

    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::never()
    }
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Another signal tied to this handle
    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            rx: Some(self.tx.subscribe()),
        }
    }
}
