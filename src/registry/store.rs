//! Frame store implementation
//!
//! Holds produced frames between the moment the producer announces them and
//! the moment the current consumer (sink or writer) is done with them.

use std::collections::HashMap;

use tokio::sync::Mutex;

use super::frame::{FrameId, StoredFrame};

/// Shared map from frame id to frame bytes
///
/// Every mutation goes through one lock. The store does not decide who may
/// remove a frame: exclusivity comes from ownership of the frame-ready queue,
/// and only the queue owner calls [`remove`](Self::remove).
#[derive(Debug, Default)]
pub struct FrameStore {
    frames: Mutex<HashMap<FrameId, StoredFrame>>,
}

impl FrameStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a frame, replacing any frame with the same id
    pub async fn put(&self, frame: StoredFrame) {
        let mut frames = self.frames.lock().await;
        if let Some(old) = frames.insert(frame.id, frame) {
            tracing::warn!(frame = %old.id, "Replaced frame that was never consumed");
        }
    }

    /// Clone out a frame without removing it
    pub async fn get(&self, id: FrameId) -> Option<StoredFrame> {
        self.frames.lock().await.get(&id).cloned()
    }

    /// Remove a frame, returning it if it was present
    pub async fn remove(&self, id: FrameId) -> Option<StoredFrame> {
        self.frames.lock().await.remove(&id)
    }

    /// Number of frames currently held
    pub async fn len(&self) -> usize {
        self.frames.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.frames.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::Dimensions;
    use bytes::Bytes;

    fn frame(epoch: u64, seq: u64) -> StoredFrame {
        StoredFrame::new(
            FrameId::new(epoch, seq),
            Bytes::from(vec![seq as u8; 4]),
            Dimensions::new(2, 2),
        )
    }

    #[tokio::test]
    async fn test_put_get_remove() {
        let store = FrameStore::new();
        assert!(store.is_empty().await);

        store.put(frame(1, 1)).await;
        store.put(frame(1, 2)).await;
        assert_eq!(store.len().await, 2);

        let got = store.get(FrameId::new(1, 2)).await.unwrap();
        assert_eq!(&got.data[..], &[2, 2, 2, 2]);
        assert_eq!(store.len().await, 2);

        assert!(store.remove(FrameId::new(1, 1)).await.is_some());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_remove_exactly_once() {
        let store = FrameStore::new();
        store.put(frame(1, 1)).await;

        assert!(store.remove(FrameId::new(1, 1)).await.is_some());
        assert!(store.remove(FrameId::new(1, 1)).await.is_none());
        assert!(store.get(FrameId::new(1, 1)).await.is_none());
    }

    #[tokio::test]
    async fn test_epochs_do_not_collide() {
        let store = FrameStore::new();
        store.put(frame(1, 1)).await;
        store.put(frame(2, 1)).await;

        assert_eq!(store.len().await, 2);
        assert!(store.remove(FrameId::new(1, 1)).await.is_some());
        assert!(store.remove(FrameId::new(2, 1)).await.is_some());
        assert!(store.is_empty().await);
    }
}
