//! Read-through cache of organization members.
//!
//! The cache is created and owned by the caller and handed to whatever needs
//! member lookups. Observers subscribe to learn when the list arrives.

use crate::error::Result;
use crate::transport::{Member, RuleTransport};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;
use vigil_validator::MemberLookup;

/// Current cache contents; `None` until the first successful load.
pub type MemberSnapshot = Option<Arc<Vec<Member>>>;

/// Shared, cloneable member cache.
#[derive(Clone)]
pub struct MemberCache {
    state: Arc<watch::Sender<MemberSnapshot>>,
}

impl Default for MemberCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MemberCache {
    /// Creates an empty, unloaded cache.
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(None);
        Self {
            state: Arc::new(state),
        }
    }

    /// True once members have been loaded.
    pub fn is_loaded(&self) -> bool {
        self.state.borrow().is_some()
    }

    /// Subscribes to cache updates.
    pub fn subscribe(&self) -> watch::Receiver<MemberSnapshot> {
        self.state.subscribe()
    }

    /// Returns the cached members, fetching them on first use.
    ///
    /// # Errors
    ///
    /// Returns the transport error if the fetch fails; the cache stays
    /// unloaded in that case.
    pub async fn load<T: RuleTransport>(&self, transport: &T) -> Result<Arc<Vec<Member>>> {
        let cached = self.state.borrow().clone();
        if let Some(members) = cached {
            return Ok(members);
        }

        let members = Arc::new(transport.list_members().await?);
        debug!("Member cache loaded with {} entries", members.len());
        self.state.send_replace(Some(Arc::clone(&members)));
        Ok(members)
    }

    /// Seeds the cache with a known member list.
    pub fn set(&self, members: Vec<Member>) {
        self.state.send_replace(Some(Arc::new(members)));
    }

    /// Drops cached members so the next [`load`](Self::load) refetches.
    pub fn invalidate(&self) {
        self.state.send_replace(None);
    }

    /// Looks a member up by id.
    pub fn get(&self, id: &str) -> Option<Member> {
        self.state
            .borrow()
            .as_ref()
            .and_then(|members| members.iter().find(|m| m.id == id).cloned())
    }
}

impl MemberLookup for MemberCache {
    fn is_loaded(&self) -> bool {
        Self::is_loaded(self)
    }

    fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::transport::{SaveRequest, SaveResponse, TaskStatus};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use vigil_rule::RuleKind;

    #[derive(Default)]
    struct CountingTransport {
        fetches: AtomicUsize,
    }

    impl RuleTransport for CountingTransport {
        async fn save_rule(&self, _request: SaveRequest) -> Result<SaveResponse> {
            Err(Error::Parse("unused".into()))
        }

        async fn fetch_task(&self, _kind: RuleKind, _uuid: &str) -> Result<TaskStatus> {
            Err(Error::Parse("unused".into()))
        }

        async fn delete_rule(&self, _kind: RuleKind, _id: &str) -> Result<()> {
            Ok(())
        }

        async fn list_members(&self) -> Result<Vec<Member>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(vec![Member {
                id: "1".into(),
                name: "Ada".into(),
                email: "ada@example.com".into(),
            }])
        }
    }

    #[tokio::test]
    async fn load_fetches_once() {
        let transport = CountingTransport::default();
        let cache = MemberCache::new();
        assert!(!cache.is_loaded());

        cache.load(&transport).await.unwrap();
        cache.load(&transport).await.unwrap();

        assert!(cache.is_loaded());
        assert_eq!(transport.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get("1").unwrap().name, "Ada");
        assert!(cache.get("2").is_none());
    }

    #[tokio::test]
    async fn subscribers_see_the_load() {
        let transport = CountingTransport::default();
        let cache = MemberCache::new();
        let mut updates = cache.subscribe();

        cache.load(&transport).await.unwrap();

        updates.changed().await.unwrap();
        assert_eq!(updates.borrow().as_ref().map(|m| m.len()), Some(1));
    }

    #[tokio::test]
    async fn invalidate_forces_refetch() {
        let transport = CountingTransport::default();
        let cache = MemberCache::new();
        cache.load(&transport).await.unwrap();
        cache.invalidate();
        assert!(!MemberLookup::is_loaded(&cache));
        cache.load(&transport).await.unwrap();
        assert_eq!(transport.fetches.load(Ordering::SeqCst), 2);
    }
}
