//! Observable application state.
//!
//! [`Store`] wraps a value behind a `tokio::sync::watch` channel: mutations
//! are applied synchronously under the channel lock and every subscriber is
//! woken with the new value.

pub mod conversations;
pub mod settings;

use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

pub use conversations::{Conversation, ConversationsState};
pub use settings::{InitialSettings, SettingsState};

/// A value with change notification.
#[derive(Debug)]
pub struct Store<T> {
    tx: watch::Sender<T>,
}

impl<T> Store<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a store holding `value`.
    pub fn new(value: T) -> Self {
        let (tx, _rx) = watch::channel(value);
        Self { tx }
    }

    /// Clone the current value.
    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }

    /// Borrow the current value for the duration of `f`.
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.tx.borrow())
    }

    /// Mutate the value and notify subscribers.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        self.tx.send_modify(f);
    }

    /// Mutate the value, notifying subscribers only when `f` returns `true`.
    pub fn update_if(&self, f: impl FnOnce(&mut T) -> bool) -> bool {
        self.tx.send_if_modified(f)
    }

    /// Replace the value.
    pub fn set(&self, value: T) {
        self.tx.send_replace(value);
    }

    /// A receiver that observes every subsequent change.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }

    /// The current value followed by every change, as a stream.
    pub fn stream(&self) -> WatchStream<T> {
        WatchStream::new(self.tx.subscribe())
    }
}

impl<T> Default for Store<T>
where
    T: Clone + Default + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[test]
    fn update_changes_value() {
        let store = Store::new(1u32);
        store.update(|v| *v += 1);
        assert_eq!(store.get(), 2);
        assert_eq!(store.read(|v| *v * 10), 20);
    }

    #[tokio::test]
    async fn subscriber_sees_update() {
        let store = Store::new(String::from("a"));
        let mut rx = store.subscribe();
        store.set("b".into());
        assert!(rx.changed().await.is_ok());
        assert_eq!(*rx.borrow(), "b");
    }

    #[test]
    fn update_if_false_does_not_notify() {
        let store = Store::new(0u8);
        let rx = store.subscribe();
        assert!(!store.update_if(|_| false));
        assert!(!rx.has_changed().unwrap_or(true));
    }

    #[tokio::test]
    async fn stream_yields_current_value_first() {
        let store = Store::new(7i32);
        let mut stream = store.stream();
        assert_eq!(stream.next().await, Some(7));
    }
}
