//! In-memory ports and an app harness shared by the handler tests.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use actix_web::body::BoxBody;
use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{App, test as actix_test, web};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pagination::PageRequest;
use serde_json::Value;

use crate::domain::ports::{
    InMemoryChannel, OrderPersistenceError, OrderRepository, UserPersistenceError, UserRepository,
};
use crate::domain::{
    NewOrder, NewUser, Order, OrderFilter, OrderId, OrderUpdate, TopUser, User, UserId, UserUpdate,
    VerificationPublisher, VerificationState,
};
use crate::inbound::http::state::HttpState;

#[derive(Debug, Clone)]
struct StoredOrder {
    id: i32,
    user_id: Option<i32>,
    delivery_address: String,
    order_date: DateTime<Utc>,
    status: String,
    note: Option<String>,
}

#[derive(Debug, Default)]
struct Store {
    next_user_id: i32,
    next_order_id: i32,
    users: BTreeMap<i32, User>,
    orders: BTreeMap<i32, StoredOrder>,
}

impl Store {
    fn materialise(&self, stored: &StoredOrder) -> Order {
        Order {
            id: OrderId::new(stored.id),
            user: stored.user_id.and_then(|id| self.users.get(&id).cloned()),
            delivery_address: stored.delivery_address.clone(),
            order_date: stored.order_date,
            status: stored.status.clone(),
            note: stored.note.clone(),
        }
    }
}

/// User repository backed by the shared in-memory store.
pub struct InMemoryUsers {
    store: Arc<Mutex<Store>>,
}

#[async_trait]
impl UserRepository for InMemoryUsers {
    async fn create(&self, user: &NewUser) -> Result<User, UserPersistenceError> {
        let mut store = self.store.lock().expect("store lock");
        if store.users.values().any(|u| u.email == user.email) {
            return Err(UserPersistenceError::DuplicateEmail);
        }
        store.next_user_id += 1;
        let id = store.next_user_id;
        let created = User {
            id: UserId::new(id),
            email: user.email.clone(),
            name: user.name.clone(),
            verified: VerificationState::Unverified,
        };
        store.users.insert(id, created.clone());
        Ok(created)
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, UserPersistenceError> {
        let store = self.store.lock().expect("store lock");
        Ok(store.users.get(&id.value()).cloned())
    }

    async fn list_all(&self) -> Result<Vec<User>, UserPersistenceError> {
        let store = self.store.lock().expect("store lock");
        Ok(store.users.values().cloned().collect())
    }

    async fn update(
        &self,
        id: UserId,
        update: &UserUpdate,
    ) -> Result<Option<User>, UserPersistenceError> {
        let mut store = self.store.lock().expect("store lock");
        if let Some(email) = &update.email
            && store
                .users
                .values()
                .any(|u| u.email == *email && u.id != id)
        {
            return Err(UserPersistenceError::DuplicateEmail);
        }
        let Some(user) = store.users.get_mut(&id.value()) else {
            return Ok(None);
        };
        if let Some(email) = &update.email {
            user.email = email.clone();
        }
        if let Some(name) = &update.name {
            user.name = name.clone();
        }
        Ok(Some(user.clone()))
    }

    async fn delete(&self, id: UserId) -> Result<Option<User>, UserPersistenceError> {
        let mut store = self.store.lock().expect("store lock");
        let removed = store.users.remove(&id.value());
        if removed.is_some() {
            for order in store.orders.values_mut() {
                if order.user_id == Some(id.value()) {
                    order.user_id = None;
                }
            }
        }
        Ok(removed)
    }

    async fn set_verification(
        &self,
        id: UserId,
        state: VerificationState,
    ) -> Result<(), UserPersistenceError> {
        let mut store = self.store.lock().expect("store lock");
        let user = store
            .users
            .get_mut(&id.value())
            .ok_or_else(|| UserPersistenceError::query("user vanished"))?;
        // Same store contract as the Diesel adapter: a Failed write never
        // demotes Verified.
        if !(state == VerificationState::Failed && user.verified.is_verified()) {
            user.verified = state;
        }
        Ok(())
    }

    async fn top_by_order_count(&self, limit: i64) -> Result<Vec<TopUser>, UserPersistenceError> {
        let store = self.store.lock().expect("store lock");
        let mut rows: Vec<TopUser> = store
            .users
            .values()
            .map(|user| TopUser {
                id: user.id,
                name: user.name.clone(),
                count: store
                    .orders
                    .values()
                    .filter(|order| order.user_id == Some(user.id.value()))
                    .count() as i64,
            })
            .collect();
        rows.sort_by(|a, b| b.count.cmp(&a.count).then(a.id.cmp(&b.id)));
        rows.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(rows)
    }
}

/// Order repository backed by the shared in-memory store.
pub struct InMemoryOrders {
    store: Arc<Mutex<Store>>,
}

impl InMemoryOrders {
    /// Number of stored orders.
    pub fn len(&self) -> usize {
        self.store.lock().expect("store lock").orders.len()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrders {
    async fn create(&self, order: &NewOrder) -> Result<Order, OrderPersistenceError> {
        let mut store = self.store.lock().expect("store lock");
        store.next_order_id += 1;
        let id = store.next_order_id;
        let stored = StoredOrder {
            id,
            user_id: order.user_id.map(|id| id.value()),
            delivery_address: order.delivery_address.clone(),
            order_date: order.order_date,
            status: order.status.clone(),
            note: order.note.clone(),
        };
        let materialised = store.materialise(&stored);
        store.orders.insert(id, stored);
        Ok(materialised)
    }

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, OrderPersistenceError> {
        let store = self.store.lock().expect("store lock");
        Ok(store
            .orders
            .get(&id.value())
            .map(|stored| store.materialise(stored)))
    }

    async fn update(
        &self,
        id: OrderId,
        update: &OrderUpdate,
    ) -> Result<Option<Order>, OrderPersistenceError> {
        let mut store = self.store.lock().expect("store lock");
        let Some(stored) = store.orders.get_mut(&id.value()) else {
            return Ok(None);
        };
        if let Some(user_id) = update.user_id {
            stored.user_id = Some(user_id.value());
        }
        if let Some(address) = &update.delivery_address {
            stored.delivery_address = address.clone();
        }
        if let Some(date) = update.order_date {
            stored.order_date = date;
        }
        if let Some(status) = &update.status {
            stored.status = status.clone();
        }
        if let Some(note) = &update.note {
            stored.note = Some(note.clone());
        }
        let stored = stored.clone();
        Ok(Some(store.materialise(&stored)))
    }

    async fn delete(&self, id: OrderId) -> Result<Option<Order>, OrderPersistenceError> {
        let mut store = self.store.lock().expect("store lock");
        let removed = store.orders.remove(&id.value());
        Ok(removed.map(|stored| store.materialise(&stored)))
    }

    async fn list(
        &self,
        filter: &OrderFilter,
        page: PageRequest,
    ) -> Result<(Vec<Order>, i64), OrderPersistenceError> {
        let store = self.store.lock().expect("store lock");
        let matching: Vec<&StoredOrder> = store
            .orders
            .values()
            .filter(|order| {
                filter
                    .user_id
                    .is_none_or(|id| order.user_id == Some(id.value()))
            })
            .filter(|order| filter.status.as_ref().is_none_or(|s| order.status == *s))
            .collect();
        let total = matching.len() as i64;
        let slice = matching
            .into_iter()
            .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
            .take(usize::try_from(page.limit()).unwrap_or(0))
            .map(|stored| store.materialise(stored))
            .collect();
        Ok((slice, total))
    }

    async fn import(&self, orders: &[NewOrder]) -> Result<usize, OrderPersistenceError> {
        // Same policy as the Diesel adapter: unknown user ids are detached,
        // never a batch failure.
        for order in orders {
            let mut order = order.clone();
            let known = {
                let store = self.store.lock().expect("store lock");
                order
                    .user_id
                    .is_some_and(|id| store.users.contains_key(&id.value()))
            };
            if !known {
                order.user_id = None;
            }
            self.create(&order).await?;
        }
        Ok(orders.len())
    }
}

/// Ports plus the app wiring the handler tests exercise.
pub struct TestHarness {
    store: Arc<Mutex<Store>>,
    pub users: Arc<InMemoryUsers>,
    pub orders: Arc<InMemoryOrders>,
    pub channel: Arc<InMemoryChannel>,
}

impl TestHarness {
    pub fn new() -> Self {
        let store = Arc::new(Mutex::new(Store::default()));
        Self {
            users: Arc::new(InMemoryUsers {
                store: store.clone(),
            }),
            orders: Arc::new(InMemoryOrders {
                store: store.clone(),
            }),
            channel: Arc::new(InMemoryChannel::new()),
            store,
        }
    }

    /// Insert a user directly and return its id.
    pub fn seed_user(&self, email: &str, name: &str) -> i32 {
        let mut store = self.store.lock().expect("store lock");
        store.next_user_id += 1;
        let id = store.next_user_id;
        store.users.insert(
            id,
            User {
                id: UserId::new(id),
                email: email.to_owned(),
                name: name.to_owned(),
                verified: VerificationState::Unverified,
            },
        );
        id
    }

    /// Insert an order directly and return its id.
    pub fn seed_order(&self, user_id: Option<i32>, status: &str) -> i32 {
        let mut store = self.store.lock().expect("store lock");
        store.next_order_id += 1;
        let id = store.next_order_id;
        store.orders.insert(
            id,
            StoredOrder {
                id,
                user_id,
                delivery_address: format!("{id} Test Lane"),
                order_date: Utc::now(),
                status: status.to_owned(),
                note: None,
            },
        );
        id
    }

    /// App with the full `/api` surface mounted over the in-memory ports.
    ///
    /// The `use<>` bound keeps the opaque type free of the `&self` lifetime;
    /// the returned app owns clones of the ports.
    pub fn app(
        &self,
    ) -> App<
        impl ServiceFactory<
            ServiceRequest,
            Config = (),
            Response = ServiceResponse<BoxBody>,
            Error = actix_web::Error,
            InitError = (),
        > + use<>,
    > {
        let state = HttpState::new(
            self.users.clone(),
            self.orders.clone(),
            VerificationPublisher::new(self.channel.clone()),
        );
        App::new()
            .app_data(web::Data::new(state))
            .service(crate::inbound::http::api_scope())
    }
}

/// Decode a response body as JSON.
pub async fn body_json(response: ServiceResponse<BoxBody>) -> Value {
    actix_test::read_body_json(response).await
}

/// Extract the `error` message from an error response body.
pub async fn read_error(response: ServiceResponse<BoxBody>) -> String {
    let body = body_json(response).await;
    body["error"].as_str().unwrap_or_default().to_owned()
}
