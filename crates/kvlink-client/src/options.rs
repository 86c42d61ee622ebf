/// Per-call cache directives for read operations.
///
/// `force` bypasses the cache and always asks the remote store. `cache`
/// decides whether a fetched value is stored in the cache; `None` falls back
/// to the client's `cache_by_default` setting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReadOptions {
    pub force: bool,
    pub cache: Option<bool>,
}

impl ReadOptions {
    /// Serve from cache when possible; cache per client default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Always hit the remote store.
    pub fn forced() -> Self {
        Self {
            force: true,
            cache: None,
        }
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn cache(mut self, cache: bool) -> Self {
        self.cache = Some(cache);
        self
    }

    pub(crate) fn cache_or(&self, default: bool) -> bool {
        self.cache.unwrap_or(default)
    }
}
