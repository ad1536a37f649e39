use std::sync::Arc;

use async_trait::async_trait;
use sqlx::SqlitePool;

pub type RoleId = i64;

/// Failure to read grant data. Never means "denied".
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("{0}")]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    Unavailable(String),
}

/// Read-only view of role and grant assignments.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// `None` when no admin has this id.
    async fn admin_role_id(&self, admin_id: &str) -> Result<Option<RoleId>, StoreError>;

    async fn role_has_permission(&self, role_id: RoleId, code: &str) -> Result<bool, StoreError>;

    async fn role_permissions(&self, role_id: RoleId) -> Result<Vec<String>, StoreError>;
}

#[derive(Debug, Clone)]
pub struct SqlitePermissionStore {
    pool: SqlitePool,
}

impl SqlitePermissionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PermissionStore for SqlitePermissionStore {
    async fn admin_role_id(&self, admin_id: &str) -> Result<Option<RoleId>, StoreError> {
        let role_id = sqlx::query_scalar::<_, i64>("SELECT role_id FROM admins WHERE id = ?")
            .bind(admin_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(role_id)
    }

    async fn role_has_permission(&self, role_id: RoleId, code: &str) -> Result<bool, StoreError> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM roles_permissions rp
            INNER JOIN permissions p ON rp.permission_id = p.id
            WHERE rp.role_id = ? AND p.code = ?
            "#,
        )
        .bind(role_id)
        .bind(code)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    async fn role_permissions(&self, role_id: RoleId) -> Result<Vec<String>, StoreError> {
        let codes = sqlx::query_scalar::<_, String>(
            r#"
            SELECT p.code
            FROM roles_permissions rp
            INNER JOIN permissions p ON rp.permission_id = p.id
            WHERE rp.role_id = ?
            ORDER BY p.code
            "#,
        )
        .bind(role_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(codes)
    }
}

/// Resolves admin -> role -> permission codes against the store on every call.
///
/// The plain methods fail closed: a store error is logged and reported as
/// "not granted" / "no role". The `try_*` methods return the error instead, for
/// callers that can report it (the gate turns it into a 500).
#[derive(Clone)]
pub struct PermissionResolver {
    store: Arc<dyn PermissionStore>,
}

impl PermissionResolver {
    pub fn new(store: impl PermissionStore + 'static) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    pub fn sqlite(pool: SqlitePool) -> Self {
        Self::new(SqlitePermissionStore::new(pool))
    }

    pub async fn try_admin_role_id(&self, admin_id: &str) -> Result<Option<RoleId>, StoreError> {
        self.store.admin_role_id(admin_id).await
    }

    pub async fn try_role_has_permission(&self, role_id: RoleId, code: &str) -> Result<bool, StoreError> {
        self.store.role_has_permission(role_id, code).await
    }

    pub async fn try_admin_has_permission(&self, admin_id: &str, code: &str) -> Result<bool, StoreError> {
        match self.try_admin_role_id(admin_id).await? {
            Some(role_id) => self.try_role_has_permission(role_id, code).await,
            None => {
                tracing::debug!(admin_id = %admin_id, permission = %code, "unknown admin");
                Ok(false)
            }
        }
    }

    pub async fn admin_role_id(&self, admin_id: &str) -> Option<RoleId> {
        match self.try_admin_role_id(admin_id).await {
            Ok(role_id) => role_id,
            Err(err) => {
                tracing::warn!(admin_id = %admin_id, error = %err, "admin role lookup failed");
                None
            }
        }
    }

    pub async fn role_has_permission(&self, role_id: RoleId, code: &str) -> bool {
        match self.try_role_has_permission(role_id, code).await {
            Ok(granted) => granted,
            Err(err) => {
                tracing::warn!(role_id, permission = %code, error = %err, "role permission check failed, denying");
                false
            }
        }
    }

    pub async fn admin_has_permission(&self, admin_id: &str, code: &str) -> bool {
        match self.try_admin_has_permission(admin_id, code).await {
            Ok(granted) => granted,
            Err(err) => {
                tracing::warn!(admin_id = %admin_id, permission = %code, error = %err, "admin permission check failed, denying");
                false
            }
        }
    }

    /// Every code granted to the role, sorted. Empty on store failure.
    pub async fn role_permissions(&self, role_id: RoleId) -> Vec<String> {
        match self.store.role_permissions(role_id).await {
            Ok(codes) => codes,
            Err(err) => {
                tracing::warn!(role_id, error = %err, "role permission listing failed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory store with a kill switch and a query counter.
    #[derive(Default)]
    pub(crate) struct MemoryStore {
        pub admins: Mutex<HashMap<String, RoleId>>,
        pub grants: Mutex<HashSet<(RoleId, String)>>,
        pub failing: AtomicBool,
        pub queries: AtomicUsize,
    }

    impl MemoryStore {
        pub fn with_admin(self, admin_id: &str, role_id: RoleId) -> Self {
            self.admins.lock().unwrap().insert(admin_id.to_string(), role_id);
            self
        }

        pub fn with_grant(self, role_id: RoleId, code: &str) -> Self {
            self.grants.lock().unwrap().insert((role_id, code.to_string()));
            self
        }

        fn check(&self) -> Result<(), StoreError> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("connection refused".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl PermissionStore for Arc<MemoryStore> {
        async fn admin_role_id(&self, admin_id: &str) -> Result<Option<RoleId>, StoreError> {
            self.check()?;
            Ok(self.admins.lock().unwrap().get(admin_id).copied())
        }

        async fn role_has_permission(&self, role_id: RoleId, code: &str) -> Result<bool, StoreError> {
            self.check()?;
            Ok(self.grants.lock().unwrap().contains(&(role_id, code.to_string())))
        }

        async fn role_permissions(&self, role_id: RoleId) -> Result<Vec<String>, StoreError> {
            self.check()?;
            let mut codes: Vec<String> = self
                .grants
                .lock()
                .unwrap()
                .iter()
                .filter(|(role, _)| *role == role_id)
                .map(|(_, code)| code.clone())
                .collect();
            codes.sort();
            Ok(codes)
        }
    }

    fn scenario() -> (Arc<MemoryStore>, PermissionResolver) {
        let store = Arc::new(
            MemoryStore::default()
                .with_admin("a1", 1)
                .with_grant(1, "requests.approve"),
        );
        (store.clone(), PermissionResolver::new(store))
    }

    #[tokio::test]
    async fn role_permission_is_exact_membership() {
        let (_, resolver) = scenario();

        assert!(resolver.role_has_permission(1, "requests.approve").await);
        assert!(!resolver.role_has_permission(1, "requests.delete").await);
        assert!(!resolver.role_has_permission(1, "requests.*").await);
        assert!(!resolver.role_has_permission(99, "requests.approve").await);
    }

    #[tokio::test]
    async fn unknown_admin_has_no_role_and_no_permission() {
        let (_, resolver) = scenario();

        assert_eq!(resolver.admin_role_id("a1").await, Some(1));
        assert_eq!(resolver.admin_role_id("ghost").await, None);
        assert!(resolver.admin_has_permission("a1", "requests.approve").await);
        assert!(!resolver.admin_has_permission("ghost", "requests.approve").await);
        assert!(!resolver.try_admin_has_permission("ghost", "requests.approve").await.unwrap());
    }

    #[tokio::test]
    async fn store_failure_fails_closed() {
        let (store, resolver) = scenario();
        store.failing.store(true, Ordering::SeqCst);

        assert!(!resolver.role_has_permission(1, "requests.approve").await);
        assert!(!resolver.admin_has_permission("a1", "requests.approve").await);
        assert_eq!(resolver.admin_role_id("a1").await, None);
        assert!(resolver.role_permissions(1).await.is_empty());
    }

    #[tokio::test]
    async fn fallible_variants_surface_store_failure() {
        let (store, resolver) = scenario();
        store.failing.store(true, Ordering::SeqCst);

        assert!(resolver.try_role_has_permission(1, "requests.approve").await.is_err());
        assert!(resolver.try_admin_role_id("a1").await.is_err());
        let err = resolver
            .try_admin_has_permission("a1", "requests.approve")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "connection refused");
    }

    #[tokio::test]
    async fn every_check_reaches_the_store() {
        let (store, resolver) = scenario();

        for _ in 0..3 {
            assert!(resolver.admin_has_permission("a1", "requests.approve").await);
        }
        // role lookup + grant lookup per check, nothing cached
        assert_eq!(store.queries.load(Ordering::SeqCst), 6);

        store.grants.lock().unwrap().clear();
        assert!(!resolver.admin_has_permission("a1", "requests.approve").await);
    }

    #[tokio::test]
    async fn role_permissions_are_sorted() {
        let store = Arc::new(
            MemoryStore::default()
                .with_grant(2, "roles.read")
                .with_grant(2, "admins.read")
                .with_grant(3, "roles.delete"),
        );
        let resolver = PermissionResolver::new(store);

        assert_eq!(resolver.role_permissions(2).await, vec!["admins.read", "roles.read"]);
    }
}
