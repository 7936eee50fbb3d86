//! Ordered map from backend watch handles to the objects they denote.

/// Sorted vector keyed by watch handle.
///
/// Backends hand out handles in increasing order, so registration is usually
/// an append. Lookups are binary searches.
#[derive(Debug, Clone)]
pub struct WatchIndex<H, T> {
    entries: Vec<(H, T)>,
}

impl<H, T> Default for WatchIndex<H, T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<H, T> WatchIndex<H, T>
where
    H: Ord + Copy + std::fmt::Debug,
{
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handle`. A handle that is already present is logged and the
    /// existing entry kept; returns whether the entry was added.
    pub fn add(&mut self, handle: H, target: T) -> bool {
        if self.entries.last().map_or(true, |(last, _)| *last < handle) {
            self.entries.push((handle, target));
            return true;
        }
        match self.position(&handle) {
            Ok(_) => {
                tracing::error!(?handle, "Watch handle already registered, ignoring");
                false
            }
            Err(at) => {
                self.entries.insert(at, (handle, target));
                true
            }
        }
    }

    /// Find the target for `handle`.
    #[must_use]
    pub fn lookup(&self, handle: &H) -> Option<&T> {
        self.position(handle).ok().map(|i| &self.entries[i].1)
    }

    /// Unregister `handle`, returning its target.
    pub fn remove(&mut self, handle: &H) -> Option<T> {
        match self.position(handle) {
            Ok(i) => Some(self.entries.remove(i).1),
            Err(_) => {
                tracing::debug!(?handle, "Watch handle to remove is not registered");
                None
            }
        }
    }

    /// Number of registered handles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no handle is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered handles in order.
    pub fn handles(&self) -> impl Iterator<Item = H> + '_ {
        self.entries.iter().map(|(h, _)| *h)
    }

    fn position(&self, handle: &H) -> Result<usize, usize> {
        self.entries.binary_search_by(|(h, _)| h.cmp(handle))
    }
}
