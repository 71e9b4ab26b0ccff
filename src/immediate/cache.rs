use std::collections::HashMap;
use std::hash::Hash;
use std::rc::Rc;

use kurbo::{Affine, BezPath};

use super::surface::{Brush, Pen};

/// Map from a derived key to a computed value. Failed computations are
/// cached as `None` so malformed input is only parsed once.
#[derive(Debug)]
pub struct CacheMap<K, V> {
    entries: HashMap<K, Option<V>>,
    hits: u64,
    misses: u64,
}

impl<K, V> Default for CacheMap<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }
}

impl<K: Eq + Hash, V: Clone> CacheMap<K, V> {
    pub fn get_or_compute<F>(&mut self, key: K, compute: F) -> Option<V>
    where
        F: FnOnce() -> Option<V>,
    {
        if let Some(entry) = self.entries.get(&key) {
            self.hits += 1;
            return entry.clone();
        }
        self.misses += 1;
        let value = compute();
        self.entries.insert(key, value.clone());
        value
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}

/// Stroke cache key: color plus dash pattern, and the width's bit pattern.
pub type PenKey = (String, u32);

/// The five per-sink caches. They are only ever cleared together.
#[derive(Debug, Default)]
pub struct SinkCaches {
    pub paths: CacheMap<String, Rc<BezPath>>,
    pub brushes: CacheMap<String, Brush>,
    pub pens: CacheMap<PenKey, Rc<Pen>>,
    pub transforms: CacheMap<String, Affine>,
    pub skins: CacheMap<String, Rc<BezPath>>,
}

impl SinkCaches {
    pub fn clear_all(&mut self) {
        self.paths.clear();
        self.brushes.clear();
        self.pens.clear();
        self.transforms.clear();
        self.skins.clear();
    }

    pub fn total_len(&self) -> usize {
        self.paths.len()
            + self.brushes.len()
            + self.pens.len()
            + self.transforms.len()
            + self.skins.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn computes_once_per_key() {
        let mut cache: CacheMap<String, u32> = CacheMap::default();
        let mut calls = 0;
        for _ in 0..3 {
            let value = cache.get_or_compute("a".into(), || {
                calls += 1;
                Some(7)
            });
            assert_eq!(value, Some(7));
        }
        assert_eq!(calls, 1);
        assert_eq!((cache.hits(), cache.misses()), (2, 1));
    }

    #[test]
    fn failures_are_remembered() {
        let mut cache: CacheMap<String, u32> = CacheMap::default();
        assert_eq!(cache.get_or_compute("bad".into(), || None), None);
        assert_eq!(cache.get_or_compute("bad".into(), || Some(1)), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn clear_all_empties_every_map() {
        let mut caches = SinkCaches::default();
        caches.paths.get_or_compute("M0 0".into(), || Some(Rc::new(BezPath::new())));
        caches.transforms.get_or_compute("scale(2)".into(), || Some(Affine::scale(2.0)));
        assert_eq!(caches.total_len(), 2);
        caches.clear_all();
        assert_eq!(caches.total_len(), 0);
    }
}
