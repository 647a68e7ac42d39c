//! Single-writer, multi-reader replicated value cell.
//!
//! Models the replicated-variable primitive the score flow depends on: the
//! authoritative side writes through [`ReplicatedCell::set`], replicas are
//! updated only by the replication layer through
//! [`ReplicatedCell::replicate`], and every change invokes the subscribed
//! callbacks synchronously after the value settles, carrying both the
//! previous and the new value.

use log::warn;

type ChangeCallback<T> = Box<dyn FnMut(Option<&T>, &T) + Send>;

pub struct ReplicatedCell<T: Clone> {
    value: Option<T>,
    writable: bool,
    callbacks: Vec<ChangeCallback<T>>,
}

impl<T: Clone> ReplicatedCell<T> {
    /// Authoritative-side cell; local writes are permitted.
    pub fn writable() -> Self {
        Self {
            value: None,
            writable: true,
            callbacks: Vec::new(),
        }
    }

    /// Replica cell; local writes are ignored, only replicated updates
    /// from the authoritative side apply.
    pub fn read_only() -> Self {
        Self {
            value: None,
            writable: false,
            callbacks: Vec::new(),
        }
    }

    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Registers a change callback invoked with `(previous, new)` after
    /// every applied update.
    pub fn on_change<F>(&mut self, callback: F)
    where
        F: FnMut(Option<&T>, &T) + Send + 'static,
    {
        self.callbacks.push(Box::new(callback));
    }

    /// Authoritative write. Silently dropped (with a log line) on replicas,
    /// mirroring server-only write permission.
    pub fn set(&mut self, value: T) {
        if !self.writable {
            warn!("Ignoring local write to read-only replicated cell");
            return;
        }
        self.apply(value);
    }

    /// Applies an update delivered by the replication layer. Valid on both
    /// sides: on the authoritative side it is equivalent to `set`.
    pub fn replicate(&mut self, value: T) {
        self.apply(value);
    }

    fn apply(&mut self, value: T) {
        let previous = self.value.replace(value.clone());
        for callback in &mut self.callbacks {
            callback(previous.as_ref(), &value);
        }
    }
}
