use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::store::{ProfileError, ProfileStore};
use super::{redirect_for, Resolution, ResolutionSource, RoleStatus, RouteAction, LANDING_ROUTE};
use crate::models::profile::{ProfileRow, Role};
use crate::session::AuthEvent;

struct ResolverState {
    status: RoleStatus,
    in_flight: bool,
    /// Bumped by every manual override; a lookup that started under an older
    /// epoch is stale when it completes.
    epoch: u64,
}

/// Per-session role state machine.
pub struct RoleResolver {
    user_id: Uuid,
    store: Arc<dyn ProfileStore>,
    state: Mutex<ResolverState>,
    /// Ticks whenever a lookup ends (completed or dropped) or a role is set.
    settled: watch::Sender<u64>,
}

/// Clears the in-flight flag if a lookup future is dropped before completing.
struct InFlightGuard<'a> {
    resolver: &'a RoleResolver,
    armed: bool,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.resolver.lock().in_flight = false;
            self.resolver.notify_settled();
        }
    }
}

impl RoleResolver {
    pub fn new(user_id: Uuid, store: Arc<dyn ProfileStore>) -> Self {
        Self {
            user_id,
            store,
            state: Mutex::new(ResolverState {
                status: RoleStatus::Checking,
                in_flight: false,
                epoch: 0,
            }),
            settled: watch::Sender::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ResolverState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify_settled(&self) {
        self.settled.send_modify(|ticks| *ticks = ticks.wrapping_add(1));
    }

    pub fn status(&self) -> RoleStatus {
        self.lock().status
    }

    /// Looks up the persisted role and returns the new status with the redirect it implies.
    ///
    /// Only one lookup runs at a time: a call made while another is pending
    /// returns the current status with no action and no store access.
    /// Store failures other than not-found degrade to `unselected` without a redirect.
    pub async fn resolve(&self, current_route: &str) -> Resolution {
        let started_epoch = {
            let mut state = self.lock();
            if state.in_flight {
                debug!(user_id = %self.user_id, "Role lookup already in flight");
                return Resolution {
                    status: state.status,
                    action: RouteAction::None,
                    source: ResolutionSource::Pending,
                };
            }
            state.in_flight = true;
            state.epoch
        };
        let mut guard = InFlightGuard {
            resolver: self,
            armed: true,
        };

        let looked_up = self.store.fetch_profile(self.user_id).await;

        guard.armed = false;
        let resolution = self.complete_lookup(started_epoch, looked_up, current_route);
        self.notify_settled();
        resolution
    }

    fn complete_lookup(
        &self,
        started_epoch: u64,
        looked_up: Result<ProfileRow, ProfileError>,
        current_route: &str,
    ) -> Resolution {
        let mut state = self.lock();
        state.in_flight = false;

        if state.epoch != started_epoch {
            debug!(user_id = %self.user_id, "Discarding role lookup superseded by selection");
            // The selection already issued any redirect.
            return Resolution {
                status: state.status,
                action: RouteAction::None,
                source: ResolutionSource::Superseded,
            };
        }

        let (status, source) = match looked_up {
            Ok(profile) => match profile.selected_role() {
                Some(role) => (RoleStatus::Resolved(role), ResolutionSource::Lookup),
                None => (RoleStatus::Unselected, ResolutionSource::Lookup),
            },
            Err(ProfileError::NotFound) => (RoleStatus::Unselected, ResolutionSource::Lookup),
            Err(e) => {
                warn!(user_id = %self.user_id, "Role lookup failed, treating as unselected: {e}");
                (RoleStatus::Unselected, ResolutionSource::Degraded)
            }
        };
        state.status = status;

        let action = match source {
            ResolutionSource::Degraded => RouteAction::None,
            _ => redirect_for(status, current_route),
        };
        Resolution {
            status,
            action,
            source,
        }
    }

    /// Settled role status for request gating.
    ///
    /// Starts a lookup when none is running; otherwise waits for the running
    /// one instead of issuing a second. Never returns `Checking`.
    pub async fn settled_status(&self) -> RoleStatus {
        loop {
            // Subscribe before resolving so a lookup finishing in between is not missed.
            let mut settled = self.settled.subscribe();
            let resolution = self.resolve(LANDING_ROUTE).await;
            if resolution.source != ResolutionSource::Pending {
                return resolution.status;
            }
            if settled.changed().await.is_err() {
                return self.status();
            }
            match self.status() {
                // The lookup was dropped before completing; run our own.
                RoleStatus::Checking => continue,
                status => return status,
            }
        }
    }

    /// Trusts a role the user just selected. No lookup; wins over any lookup still in flight.
    pub fn set_role(&self, role: Role, current_route: &str) -> Resolution {
        let status = {
            let mut state = self.lock();
            state.epoch += 1;
            state.status = RoleStatus::Resolved(role);
            state.status
        };
        self.notify_settled();
        info!(user_id = %self.user_id, role = role.as_str(), "Role set by selection");
        Resolution {
            status,
            action: redirect_for(status, current_route),
            source: ResolutionSource::Override,
        }
    }
}

/// Owns one [`RoleResolver`] per signed-in user.
#[derive(Clone)]
pub struct ResolverRegistry {
    store: Arc<dyn ProfileStore>,
    resolvers: Arc<Mutex<HashMap<Uuid, Arc<RoleResolver>>>>,
}

impl ResolverRegistry {
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        Self {
            store,
            resolvers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn resolver_for(&self, user_id: Uuid) -> Arc<RoleResolver> {
        self.resolvers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(user_id)
            .or_insert_with(|| Arc::new(RoleResolver::new(user_id, self.store.clone())))
            .clone()
    }

    pub fn remove(&self, user_id: Uuid) -> bool {
        self.resolvers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&user_id)
            .is_some()
    }

    /// Creates profiles for newly signed-in users and tears resolvers down on sign-out.
    pub fn spawn_session_listener(&self, mut events: broadcast::Receiver<AuthEvent>) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(AuthEvent::SignedOut(user_id)) => {
                        if registry.remove(user_id) {
                            debug!(%user_id, "Dropped role resolver on sign-out");
                        }
                    }
                    Ok(AuthEvent::SignedIn(user)) => {
                        if let Err(e) = registry.store.ensure_profile(&user).await {
                            warn!(user_id = %user.id, "Could not create profile: {e}");
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Session listener lagged, {skipped} auth events skipped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use super::*;
    use crate::roles::{EMPLOYEE_DASHBOARD_ROUTE, EMPLOYER_DASHBOARD_ROUTE};
    use crate::session::{SessionProvider, SessionUser};
    use crate::test_support::{mint_token, test_auth_client, MemoryProfileStore, TEST_JWT_SECRET};

    fn resolver(store: &Arc<MemoryProfileStore>) -> RoleResolver {
        RoleResolver::new(Uuid::new_v4(), store.clone())
    }

    #[tokio::test]
    async fn test_starts_in_checking() {
        let store = Arc::new(MemoryProfileStore::default());
        assert_eq!(resolver(&store).status(), RoleStatus::Checking);
    }

    #[tokio::test]
    async fn test_role_not_selected_is_unselected_and_blocks_dashboards() {
        let store = Arc::new(MemoryProfileStore::default());
        let resolver = resolver(&store);
        store.put(resolver.user_id, Some("employer"), false);

        let on_dashboard = resolver.resolve(EMPLOYER_DASHBOARD_ROUTE).await;
        assert_eq!(on_dashboard.status, RoleStatus::Unselected);
        assert_eq!(
            on_dashboard.action,
            RouteAction::Redirect {
                to: LANDING_ROUTE.to_string()
            }
        );

        let on_employee = resolver.resolve(EMPLOYEE_DASHBOARD_ROUTE).await;
        assert_eq!(
            on_employee.action,
            RouteAction::Redirect {
                to: LANDING_ROUTE.to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_missing_profile_is_unselected() {
        let store = Arc::new(MemoryProfileStore::default());
        let resolution = resolver(&store).resolve(LANDING_ROUTE).await;
        assert_eq!(resolution.status, RoleStatus::Unselected);
        assert_eq!(resolution.source, ResolutionSource::Lookup);
        assert_eq!(resolution.action, RouteAction::None);
    }

    #[tokio::test]
    async fn test_employer_redirects_once_from_landing() {
        let store = Arc::new(MemoryProfileStore::default());
        let resolver = resolver(&store);
        store.put(resolver.user_id, Some("employer"), true);

        let first = resolver.resolve(LANDING_ROUTE).await;
        assert_eq!(first.status, RoleStatus::Resolved(Role::Employer));
        assert_eq!(
            first.action,
            RouteAction::Redirect {
                to: EMPLOYER_DASHBOARD_ROUTE.to_string()
            }
        );

        // The client followed the redirect; resolving again from there is quiet.
        let second = resolver.resolve(EMPLOYER_DASHBOARD_ROUTE).await;
        assert_eq!(second.status, RoleStatus::Resolved(Role::Employer));
        assert_eq!(second.action, RouteAction::None);
    }

    #[tokio::test]
    async fn test_store_failure_degrades_without_redirect() {
        let store = Arc::new(MemoryProfileStore::default());
        store.fail.store(true, Ordering::SeqCst);
        let resolution = resolver(&store).resolve(EMPLOYER_DASHBOARD_ROUTE).await;
        assert_eq!(resolution.status, RoleStatus::Unselected);
        assert_eq!(resolution.source, ResolutionSource::Degraded);
        assert_eq!(resolution.action, RouteAction::None);
    }

    #[tokio::test]
    async fn test_concurrent_resolves_issue_one_lookup() {
        let store = Arc::new(MemoryProfileStore::default());
        store.hold.store(true, Ordering::SeqCst);
        let resolver = Arc::new(resolver(&store));
        store.put(resolver.user_id, Some("employee"), true);

        let first = tokio::spawn({
            let resolver = resolver.clone();
            async move { resolver.resolve(LANDING_ROUTE).await }
        });
        while store.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        let duplicate = resolver.resolve(LANDING_ROUTE).await;
        assert_eq!(duplicate.source, ResolutionSource::Pending);
        assert_eq!(duplicate.status, RoleStatus::Checking);
        assert_eq!(duplicate.action, RouteAction::None);

        store.release.notify_one();
        let first = first.await.unwrap();
        assert_eq!(first.status, RoleStatus::Resolved(Role::Employee));
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_override_wins_over_in_flight_lookup() {
        let store = Arc::new(MemoryProfileStore::default());
        store.hold.store(true, Ordering::SeqCst);
        let resolver = Arc::new(resolver(&store));

        let lookup = tokio::spawn({
            let resolver = resolver.clone();
            async move { resolver.resolve(LANDING_ROUTE).await }
        });
        while store.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        let selected = resolver.set_role(Role::Employer, LANDING_ROUTE);
        assert_eq!(selected.source, ResolutionSource::Override);

        store.release.notify_one();
        let lookup = lookup.await.unwrap();
        assert_eq!(lookup.source, ResolutionSource::Superseded);
        // The selection already redirected; the stale lookup must not repeat it.
        assert_eq!(lookup.action, RouteAction::None);
        assert_eq!(resolver.status(), RoleStatus::Resolved(Role::Employer));
    }

    #[tokio::test]
    async fn test_settled_status_waits_for_in_flight_lookup() {
        let store = Arc::new(MemoryProfileStore::default());
        store.hold.store(true, Ordering::SeqCst);
        let resolver = Arc::new(resolver(&store));
        store.put(resolver.user_id, Some("employee"), true);

        let lookup = tokio::spawn({
            let resolver = resolver.clone();
            async move { resolver.resolve(LANDING_ROUTE).await }
        });
        while store.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        let waiter = tokio::spawn({
            let resolver = resolver.clone();
            async move { resolver.settled_status().await }
        });
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(!waiter.is_finished());

        store.release.notify_one();
        assert_eq!(waiter.await.unwrap(), RoleStatus::Resolved(Role::Employee));
        assert_eq!(lookup.await.unwrap().status, RoleStatus::Resolved(Role::Employee));
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_settled_status_runs_own_lookup_after_dropped_one() {
        let store = Arc::new(MemoryProfileStore::default());
        store.hold.store(true, Ordering::SeqCst);
        let resolver = Arc::new(resolver(&store));
        store.put(resolver.user_id, Some("employer"), true);

        let lookup = tokio::spawn({
            let resolver = resolver.clone();
            async move { resolver.resolve(LANDING_ROUTE).await }
        });
        while store.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        let waiter = tokio::spawn({
            let resolver = resolver.clone();
            async move { resolver.settled_status().await }
        });
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        store.hold.store(false, Ordering::SeqCst);
        lookup.abort();
        let _ = lookup.await;

        assert_eq!(waiter.await.unwrap(), RoleStatus::Resolved(Role::Employer));
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_override_without_lookup() {
        let store = Arc::new(MemoryProfileStore::default());
        let resolver = resolver(&store);
        let resolution = resolver.set_role(Role::Independent, LANDING_ROUTE);
        assert_eq!(resolution.status, RoleStatus::Resolved(Role::Independent));
        assert_eq!(
            resolution.action,
            RouteAction::Redirect {
                to: EMPLOYEE_DASHBOARD_ROUTE.to_string()
            }
        );
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_dropped_lookup_releases_guard() {
        let store = Arc::new(MemoryProfileStore::default());
        store.hold.store(true, Ordering::SeqCst);
        let resolver = Arc::new(resolver(&store));

        let lookup = tokio::spawn({
            let resolver = resolver.clone();
            async move { resolver.resolve(LANDING_ROUTE).await }
        });
        while store.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        lookup.abort();
        let _ = lookup.await;

        store.hold.store(false, Ordering::SeqCst);
        let resolution = resolver.resolve(LANDING_ROUTE).await;
        assert_eq!(resolution.source, ResolutionSource::Lookup);
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_sign_in_creates_unselected_profile() {
        let store = Arc::new(MemoryProfileStore::default());
        let registry = ResolverRegistry::new(store.clone());
        let user = SessionUser {
            id: Uuid::new_v4(),
            email: Some("new.hire@example.test".to_string()),
            metadata: serde_json::Map::new(),
        };

        let (tx, rx) = broadcast::channel(4);
        let listener = registry.spawn_session_listener(rx);
        tx.send(AuthEvent::SignedIn(user.clone())).unwrap();
        drop(tx);
        listener.await.unwrap();

        let resolution = registry.resolver_for(user.id).resolve(LANDING_ROUTE).await;
        assert_eq!(resolution.status, RoleStatus::Unselected);
        assert!(store.exists(user.id));
    }

    #[tokio::test]
    async fn test_sign_in_keeps_existing_selection() {
        let store = Arc::new(MemoryProfileStore::default());
        let user_id = Uuid::new_v4();
        store.put(user_id, Some("employer"), true);
        let user = SessionUser {
            id: user_id,
            email: None,
            metadata: serde_json::Map::new(),
        };
        store.ensure_profile(&user).await.unwrap();

        let resolution = RoleResolver::new(user_id, store).resolve(LANDING_ROUTE).await;
        assert_eq!(resolution.status, RoleStatus::Resolved(Role::Employer));
    }

    #[tokio::test]
    async fn test_registry_reuses_and_tears_down_on_sign_out() {
        let store = Arc::new(MemoryProfileStore::default());
        let registry = ResolverRegistry::new(store);
        let user = Uuid::new_v4();

        let a = registry.resolver_for(user);
        let b = registry.resolver_for(user);
        assert!(Arc::ptr_eq(&a, &b));

        let (tx, rx) = broadcast::channel(4);
        let listener = registry.spawn_session_listener(rx);
        tx.send(AuthEvent::SignedOut(user)).unwrap();
        drop(tx);
        listener.await.unwrap();

        assert!(!Arc::ptr_eq(&a, &registry.resolver_for(user)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_session_drops_resolver() {
        let store = Arc::new(MemoryProfileStore::default());
        let registry = ResolverRegistry::new(store);
        let sessions = SessionProvider::new(test_auth_client());
        let listener = registry.spawn_session_listener(sessions.subscribe());
        let user = Uuid::new_v4();
        sessions
            .current_session(&mint_token(user, TEST_JWT_SECRET, 60))
            .unwrap();
        let before = registry.resolver_for(user);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(sessions.expire_sessions(), vec![user]);
        drop(sessions);
        listener.await.unwrap();

        assert!(!Arc::ptr_eq(&before, &registry.resolver_for(user)));
    }
}
