// Holds a store behind an atomically swapped Arc so the audio side can read
// whole snapshots while the ui replaces them. Readers never see a half-applied
// edit: every write clones, mutates the clone and swaps it in.

use std::sync::Arc;

use arc_swap::ArcSwap;

pub struct Shared<T> {
    inner: Arc<ArcSwap<T>>,
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<T: Default> Default for Shared<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> Shared<T> {
    pub fn new(value: T) -> Self {
        Self { inner: Arc::new(ArcSwap::from_pointee(value)) }
    }

    /// Current snapshot. Stays valid (and unchanged) after later writes.
    pub fn load(&self) -> Arc<T> {
        self.inner.load_full()
    }

    pub fn replace(&self, value: T) {
        self.inner.store(Arc::new(value));
    }
}

impl<T: Clone> Shared<T> {
    // single writer (the interaction thread), so load-modify-store is enough
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut next = T::clone(&self.inner.load());
        let out = f(&mut next);
        self.inner.store(Arc::new(next));
        out
    }

    /// Like `update`, but a failed edit leaves the stored value untouched.
    pub fn try_update<R, E>(&self, f: impl FnOnce(&mut T) -> Result<R, E>) -> Result<R, E> {
        let mut next = T::clone(&self.inner.load());
        let out = f(&mut next)?;
        self.inner.store(Arc::new(next));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn old_snapshot_survives_update() {
        let shared = Shared::new(vec![1, 2, 3]);
        let before = shared.load();
        shared.update(|v| v.push(4));
        assert_eq!(*before, vec![1, 2, 3]);
        assert_eq!(*shared.load(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn failed_edit_is_not_stored() {
        let shared = Shared::new(0u32);
        let res: Result<(), &str> = shared.try_update(|v| {
            *v = 9;
            Err("nope")
        });
        assert!(res.is_err());
        assert_eq!(*shared.load(), 0);
    }

    #[test]
    fn clones_see_the_same_store() {
        let a = Shared::new(String::from("a"));
        let b = a.clone();
        b.replace(String::from("b"));
        assert_eq!(a.load().as_str(), "b");
    }
}
