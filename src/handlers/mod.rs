//! Thin JSON surface over the checkout workflow. Routes carry the step
//! action name; the session travels in the `x-checkout-session` header.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::checkout::{CheckoutContext, CheckoutRedirect, StepRequest, WorkflowOutcome};
use crate::errors::{CheckoutError, ServiceError};
use crate::events::Event;
use crate::models::{FormData, ShoppingCart};
use crate::AppState;

pub const SESSION_HEADER: &str = "x-checkout-session";

/// The controller name every step route is registered under.
const CONTROLLER: &str = "checkout";

pub fn checkout_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(start_checkout))
        .route("/", get(current_step))
        .route("/", delete(abandon_checkout))
        .route("/:action", post(submit_step))
}

#[derive(Debug, Deserialize)]
struct StartCheckoutRequest {
    cart: ShoppingCart,
}

#[derive(Debug, Serialize)]
struct StartCheckoutResponse {
    session_id: Uuid,
    #[serde(flatten)]
    outcome: OutcomeResponse,
}

#[derive(Debug, Deserialize, Default)]
struct SubmitStepRequest {
    #[serde(default)]
    form: FormData,
}

/// Wire form of a `WorkflowOutcome`.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum OutcomeResponse {
    Step {
        action: String,
        errors: Vec<CheckoutError>,
    },
    Rejected {
        action: String,
        errors: Vec<CheckoutError>,
    },
    Redirect {
        redirect: CheckoutRedirect,
        /// Non-fatal notices accompanying the navigation (throttle warning,
        /// cart warnings, recoverable payment failures).
        errors: Vec<CheckoutError>,
    },
    Completed {
        order_id: Uuid,
    },
}

impl From<WorkflowOutcome> for OutcomeResponse {
    fn from(outcome: WorkflowOutcome) -> Self {
        match outcome {
            WorkflowOutcome::AtStep { route, errors } => Self::Step {
                action: route.action,
                errors,
            },
            WorkflowOutcome::Redisplay { route, errors } => Self::Rejected {
                action: route.action,
                errors,
            },
            WorkflowOutcome::Redirect { redirect, errors } => Self::Redirect { redirect, errors },
            WorkflowOutcome::Completed { order_id } => Self::Completed { order_id },
        }
    }
}

/// The order id when the outcome finishes the checkout: a completed
/// confirmation, or an external hosted page reached after placement.
fn placed_order_id(outcome: &WorkflowOutcome) -> Option<Uuid> {
    match outcome {
        WorkflowOutcome::Completed { order_id } => Some(*order_id),
        WorkflowOutcome::Redirect {
            redirect:
                CheckoutRedirect::External {
                    order_id: Some(order_id),
                    ..
                },
            ..
        } => Some(*order_id),
        _ => None,
    }
}

fn session_id(headers: &HeaderMap) -> Result<Uuid, ServiceError> {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| {
            ServiceError::InvalidInput(format!("missing or malformed {} header", SESSION_HEADER))
        })
}

async fn start_checkout(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<StartCheckoutRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let session_id = state.sessions.create(payload.cart);
    let mut data = state.sessions.load(session_id)?;

    state
        .event_sender
        .send_or_log(Event::CheckoutStarted {
            session_id,
            customer_id: data.cart.customer.id,
        })
        .await;

    let outcome = {
        let mut ctx = CheckoutContext {
            cart: &mut data.cart,
            state: &mut data.state,
        };
        state.workflow.progress(&mut ctx).await?
    };
    state.sessions.save(session_id, data);

    Ok((
        StatusCode::CREATED,
        Json(StartCheckoutResponse {
            session_id,
            outcome: outcome.into(),
        }),
    ))
}

async fn current_step(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<OutcomeResponse>, ServiceError> {
    let session_id = session_id(&headers)?;
    let mut data = state.sessions.load(session_id)?;

    let outcome = {
        let mut ctx = CheckoutContext {
            cart: &mut data.cart,
            state: &mut data.state,
        };
        state.workflow.progress(&mut ctx).await?
    };
    state.sessions.save(session_id, data);

    Ok(Json(outcome.into()))
}

async fn submit_step(
    State(state): State<Arc<AppState>>,
    Path(action): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<SubmitStepRequest>,
) -> Result<Json<OutcomeResponse>, ServiceError> {
    let session_id = session_id(&headers)?;
    let mut data = state.sessions.load(session_id)?;

    let request = StepRequest::new(action, payload.form);
    let outcome = {
        let mut ctx = CheckoutContext {
            cart: &mut data.cart,
            state: &mut data.state,
        };
        state.workflow.process(&mut ctx, CONTROLLER, &request).await?
    };

    if let Some(order_id) = placed_order_id(&outcome) {
        state
            .event_sender
            .send_or_log(Event::CheckoutCompleted {
                session_id,
                order_id,
            })
            .await;
        state.sessions.remove(session_id);
    } else {
        state.sessions.save(session_id, data);
    }

    Ok(Json(outcome.into()))
}

async fn abandon_checkout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<StatusCode, ServiceError> {
    let session_id = session_id(&headers)?;
    state.sessions.remove(session_id);
    state
        .event_sender
        .send_or_log(Event::CheckoutAbandoned { session_id })
        .await;
    Ok(StatusCode::NO_CONTENT)
}
