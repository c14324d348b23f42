//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::Arc;

use teamcal::{Calendar, CalendarConfig, Session};
use teamcal_core::{Grouping, Role, User};
use teamcal_crypto::{KeyEnvelope, MasterKey, UserKey};
use teamcal_store::{MemoryStore, Store};

/// A calendar with a system admin and `n` ordinary users registered.
pub struct CalendarFixture<S: Store = MemoryStore> {
    pub calendar: Calendar<S>,
    /// The envelope service the calendar seals with.
    pub envelope: Arc<KeyEnvelope>,
    pub admin: User,
    pub users: Vec<User>,
}

impl CalendarFixture<MemoryStore> {
    /// Over a fresh memory store with a random master key.
    pub async fn new(n: usize) -> Self {
        Self::with_store(MemoryStore::new(), n).await
    }
}

impl<S: Store> CalendarFixture<S> {
    /// Over `store`, which must be empty.
    pub async fn with_store(store: S, n: usize) -> Self {
        Self::with_config(store, CalendarConfig::default(), n).await
    }

    pub async fn with_config(store: S, config: CalendarConfig, n: usize) -> Self {
        let envelope = Arc::new(KeyEnvelope::new(MasterKey::generate()));
        let calendar = Calendar::with_shared(Arc::new(store), envelope.clone(), config);

        let admin = calendar
            .register_user("admin@example.com", "Admin", "fixture-hash")
            .await
            .expect("register admin");
        calendar
            .store()
            .set_user_role(&admin.id, Role::Admin, admin.created_at)
            .await
            .expect("promote admin");
        let admin = User {
            role: Role::Admin,
            ..admin
        };

        let mut users = Vec::with_capacity(n);
        for i in 0..n {
            let user = calendar
                .register_user(
                    &format!("user{}@example.com", i),
                    &format!("User {}", i),
                    "fixture-hash",
                )
                .await
                .expect("register user");
            users.push(user);
        }

        Self {
            calendar,
            envelope,
            admin,
            users,
        }
    }

    /// Session of the `i`th ordinary user.
    pub fn session(&self, i: usize) -> Session {
        Session::user(self.users[i].id)
    }

    pub fn admin_session(&self) -> Session {
        Session::user(self.admin.id)
    }

    /// Unveil a user's data key, as only the calendar itself normally does.
    pub fn user_key(&self, user: &User) -> UserKey {
        let stored = user
            .encrypted_private_key
            .as_deref()
            .expect("user has an enveloped key");
        self.envelope.unveil(stored).expect("unveil user key")
    }

    /// A public grouping created by the admin.
    pub async fn grouping(&self, name: &str) -> Grouping {
        self.calendar
            .create_grouping(&self.admin_session(), name, None, false)
            .await
            .expect("create grouping")
    }
}
