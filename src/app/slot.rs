use std::future::Future;
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug, thiserror::Error)]
#[error("another operation is already running")]
pub struct SlotBusy;

/// Single-permit guard that lets at most one studio operation run at a time.
#[derive(Debug, Clone)]
pub struct RunSlot {
    semaphore: Arc<Semaphore>,
}

impl Default for RunSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl RunSlot {
    pub fn new() -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(1)),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.semaphore.available_permits() == 0
    }

    /// Takes the slot for the duration of a short synchronous mutation.
    pub fn try_hold(&self) -> Result<OwnedSemaphorePermit, SlotBusy> {
        Arc::clone(&self.semaphore)
            .try_acquire_owned()
            .map_err(|_| SlotBusy)
    }

    /// Spawns `fut` in the background, keeping the slot until it completes.
    pub fn try_spawn<F>(&self, fut: F) -> Result<(), SlotBusy>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permit = self.try_hold()?;
        tokio::spawn(async move {
            let _permit = permit;
            fut.await;
        });
        Ok(())
    }
}
