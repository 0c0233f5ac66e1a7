use std::num::NonZeroUsize;

use lru::LruCache;

/// Short code to destination URL, for the redirect path.
///
/// Links never change once minted, so entries only go stale when their
/// recipe is deleted, and [`Cache::evict`] is called then.
pub struct Cache {
    data: LruCache<String, String>,
}

impl Cache {
    pub fn new(capacity: NonZeroUsize) -> Cache {
        Cache {
            data: LruCache::new(capacity),
        }
    }

    pub fn get(&mut self, code: &str) -> Option<String> {
        self.data.get(code).cloned()
    }

    pub fn insert(&mut self, code: String, dest_url: String) {
        self.data.put(code, dest_url);
    }

    pub fn evict(&mut self, code: &str) {
        self.data.pop(code);
    }
}
