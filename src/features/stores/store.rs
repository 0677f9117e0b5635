//! リアクティブなコレクションストア
//!
//! コレクションの最新スナップショットを保持し、置き換えのたびに
//! 購読者へ同期的に通知します。部分更新は行わず、常に全体を置き換えます。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

/// 購読ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber<T> = Arc<dyn Fn(&[T]) + Send + Sync>;

/// コレクションストア
pub struct CollectionStore<T> {
    snapshot: RwLock<Arc<Vec<T>>>,
    subscribers: Mutex<Vec<(SubscriptionId, Subscriber<T>)>>,
    next_id: AtomicU64,
}

impl<T> CollectionStore<T> {
    /// 空のストアを作成
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(Vec::new())),
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// 現在のスナップショット
    pub fn snapshot(&self) -> Arc<Vec<T>> {
        self.snapshot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// 購読を開始する
    ///
    /// 登録直後に現在のスナップショットで一度呼び出される。
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&[T]) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let callback: Subscriber<T> = Arc::new(callback);

        self.lock_subscribers().push((id, callback.clone()));
        callback(self.snapshot().as_slice());
        id
    }

    /// 購読を解除する
    ///
    /// # 戻り値
    /// 解除した場合はtrue
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.lock_subscribers();
        let before = subscribers.len();
        subscribers.retain(|(subscription, _)| *subscription != id);
        before != subscribers.len()
    }

    /// スナップショットを置き換え、全購読者へ通知する
    pub fn replace(&self, items: Vec<T>) {
        let snapshot = Arc::new(items);
        *self
            .snapshot
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = snapshot.clone();

        // 購読者はロックを解放してから呼び出す
        let subscribers: Vec<Subscriber<T>> = self
            .lock_subscribers()
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();
        for callback in subscribers {
            callback(snapshot.as_slice());
        }
    }

    /// 購読者数
    pub fn subscriber_count(&self) -> usize {
        self.lock_subscribers().len()
    }

    fn lock_subscribers(
        &self,
    ) -> std::sync::MutexGuard<'_, Vec<(SubscriptionId, Subscriber<T>)>> {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<T> Default for CollectionStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for CollectionStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionStore")
            .field("len", &self.snapshot().len())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_receives_current_snapshot_immediately() {
        let store = CollectionStore::new();
        store.replace(vec![1, 2, 3]);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        store.subscribe(move |items: &[i32]| sink.lock().unwrap().push(items.to_vec()));

        assert_eq!(*seen.lock().unwrap(), vec![vec![1, 2, 3]]);
    }

    #[test]
    fn test_replace_notifies_synchronously() {
        let store = CollectionStore::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        store.subscribe(move |items: &[&str]| sink.lock().unwrap().push(items.len()));

        store.replace(vec!["a"]);
        store.replace(vec!["a", "b"]);

        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(*store.snapshot(), vec!["a", "b"]);
    }

    #[test]
    fn test_unsubscribe_stops_notifications() {
        let store = CollectionStore::new();
        let count = Arc::new(AtomicU64::new(0));
        let counter = count.clone();
        let id = store.subscribe(move |_: &[u8]| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(store.unsubscribe(id));
        assert!(!store.unsubscribe(id));
        store.replace(vec![1]);

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(store.subscriber_count(), 0);
    }

    #[test]
    fn test_snapshot_survives_later_replace() {
        let store = CollectionStore::new();
        store.replace(vec![1]);
        let old = store.snapshot();
        store.replace(vec![2, 3]);
        assert_eq!(*old, vec![1]);
        assert_eq!(store.snapshot().len(), 2);
    }
}
