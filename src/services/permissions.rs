use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::client::ApiClient;
use crate::errors::{ClientError, ClientResult};
use crate::models::rbac::PermissionCodesResponse;
use crate::session::{keys, SessionStore};

const MY_PERMISSIONS_PATH: &str = "auth/me/permissions";

/// Anything that can report the permission codes of the current session.
#[async_trait]
pub trait PermissionSource: Send + Sync {
    async fn my_permission_codes(&self) -> ClientResult<Vec<String>>;
}

#[async_trait]
impl<T: PermissionSource + ?Sized> PermissionSource for Arc<T> {
    async fn my_permission_codes(&self) -> ClientResult<Vec<String>> {
        (**self).my_permission_codes().await
    }
}

/// Drops any memoized permission state.
pub trait Invalidate: Send + Sync {
    fn invalidate(&self);
}

/// Fetches permission codes straight from the backend.
pub struct PermissionService {
    client: Arc<ApiClient>,
}

impl PermissionService {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PermissionSource for PermissionService {
    async fn my_permission_codes(&self) -> ClientResult<Vec<String>> {
        let response: PermissionCodesResponse = match self.client.get(MY_PERMISSIONS_PATH).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(error = %err, kind = err.kind(), "permission fetch failed");
                return Err(ClientError::PermissionsUnavailable);
            }
        };

        // Derived copy only; failures to persist it are not fatal.
        match serde_json::to_string(&response.codes) {
            Ok(raw) => {
                if let Err(err) = self.client.session().set(keys::PERMISSION_CODES, raw) {
                    tracing::warn!(error = %err, "failed to cache permission codes");
                }
            }
            Err(err) => tracing::warn!(error = %err, "failed to serialize permission codes"),
        }

        tracing::debug!(count = response.codes.len(), "permission codes loaded");
        Ok(response.codes)
    }
}

struct Slot {
    generation: u64,
    token: Option<String>,
    codes: Option<Arc<Vec<String>>>,
}

/// De-duplicating cache in front of a [`PermissionSource`].
///
/// Concurrent callers queue on one fetch and share its result. An entry is
/// only reused while the access token it was fetched with is still the
/// session's token and no invalidation happened since. Errors are never
/// cached.
pub struct PermissionCache<S> {
    source: S,
    session: Arc<dyn SessionStore>,
    generation: AtomicU64,
    slot: Mutex<Slot>,
}

impl<S: PermissionSource> PermissionCache<S> {
    pub fn new(source: S, session: Arc<dyn SessionStore>) -> Self {
        Self {
            source,
            session,
            generation: AtomicU64::new(0),
            slot: Mutex::new(Slot {
                generation: 0,
                token: None,
                codes: None,
            }),
        }
    }

    pub async fn codes(&self) -> ClientResult<Arc<Vec<String>>> {
        let mut slot = self.slot.lock().await;
        let generation = self.generation.load(Ordering::SeqCst);
        let token = self.session.access_token();

        if slot.generation == generation && slot.token == token {
            if let Some(codes) = &slot.codes {
                return Ok(Arc::clone(codes));
            }
        }

        let codes = Arc::new(self.source.my_permission_codes().await?);

        // An invalidation or token change during the fetch makes the result
        // usable for this caller only.
        if self.generation.load(Ordering::SeqCst) == generation && self.session.access_token() == token {
            *slot = Slot {
                generation,
                token,
                codes: Some(Arc::clone(&codes)),
            };
        }

        Ok(codes)
    }
}

impl<S: Send + Sync> Invalidate for PermissionCache<S> {
    fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("permission cache invalidated");
    }
}

#[async_trait]
impl<S: PermissionSource> PermissionSource for PermissionCache<S> {
    async fn my_permission_codes(&self) -> ClientResult<Vec<String>> {
        Ok(self.codes().await?.as_ref().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemorySessionStore;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    struct CountingSource {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingSource {
        fn new(fail: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail,
            }
        }
    }

    #[async_trait]
    impl PermissionSource for CountingSource {
        async fn my_permission_codes(&self) -> ClientResult<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.fail {
                return Err(ClientError::PermissionsUnavailable);
            }
            Ok(vec!["clientes.clientes.ver".to_string()])
        }
    }

    fn session() -> Arc<MemorySessionStore> {
        Arc::new(MemorySessionStore::with_tokens("token-a", Some("refresh")))
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_fetch() {
        let source = Arc::new(CountingSource::new(false));
        let cache = Arc::new(PermissionCache::new(Arc::clone(&source), session()));

        let (a, b, c) = tokio::join!(cache.codes(), cache.codes(), cache.codes());
        assert_eq!(*a.unwrap(), vec!["clientes.clientes.ver"]);
        assert_eq!(code_count(&b), 1);
        assert_eq!(code_count(&c), 1);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    fn code_count(result: &ClientResult<Arc<Vec<String>>>) -> usize {
        result.as_ref().map(|codes| codes.len()).unwrap_or(0)
    }

    #[tokio::test]
    async fn invalidate_forces_refetch() {
        let source = Arc::new(CountingSource::new(false));
        let cache = PermissionCache::new(Arc::clone(&source), session());

        cache.codes().await.unwrap();
        cache.codes().await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        cache.invalidate();
        cache.codes().await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn token_change_forces_refetch() {
        let source = Arc::new(CountingSource::new(false));
        let store = session();
        let cache = PermissionCache::new(Arc::clone(&source), store.clone());

        cache.codes().await.unwrap();
        store.set(keys::ACCESS_TOKEN, "token-b".to_string()).unwrap();
        cache.codes().await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let source = Arc::new(CountingSource::new(true));
        let cache = PermissionCache::new(Arc::clone(&source), session());

        assert!(cache.codes().await.is_err());
        assert!(cache.codes().await.is_err());
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }
}
