use dashmap::DashMap;
use uuid::Uuid;

use crate::checkout::CheckoutState;
use crate::errors::ServiceError;
use crate::models::ShoppingCart;

/// One customer's checkout in progress: the cart snapshot being worked on
/// and the session-scoped state.
#[derive(Debug, Clone)]
pub struct CheckoutSessionData {
    pub cart: ShoppingCart,
    pub state: CheckoutState,
}

/// In-memory store of active checkout sessions, keyed by session id.
///
/// Single writer per session is assumed: a customer does not submit two
/// checkout requests concurrently. Concurrent submits for one session can
/// interleave load/save; this is an accepted risk, the confirm step's
/// placement-interval guard is the double-submit mitigation.
#[derive(Debug, Default)]
pub struct CheckoutSessionStore {
    sessions: DashMap<Uuid, CheckoutSessionData>,
}

impl CheckoutSessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a checkout session for a cart, returning the session id.
    pub fn create(&self, cart: ShoppingCart) -> Uuid {
        let id = Uuid::new_v4();
        self.sessions.insert(
            id,
            CheckoutSessionData {
                cart,
                state: CheckoutState::new(),
            },
        );
        id
    }

    pub fn load(&self, id: Uuid) -> Result<CheckoutSessionData, ServiceError> {
        self.sessions
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ServiceError::SessionNotFound(id.to_string()))
    }

    pub fn save(&self, id: Uuid, data: CheckoutSessionData) {
        self.sessions.insert(id, data);
    }

    /// Ends the session (order placed or checkout abandoned).
    pub fn remove(&self, id: Uuid) {
        self.sessions.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
