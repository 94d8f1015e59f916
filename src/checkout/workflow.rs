use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::errors::{CheckoutError, ServiceError};

use super::{
    CheckoutContext, CheckoutHandler, CheckoutRedirect, HandlerIdentity, StepRequest, StepRoute,
};

/// Navigation decision produced by one workflow pass.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowOutcome {
    /// GET navigation landed on this step; display it.
    AtStep {
        route: StepRoute,
        errors: Vec<CheckoutError>,
    },
    /// A submit was rejected; redisplay the step with its errors.
    Redisplay {
        route: StepRoute,
        errors: Vec<CheckoutError>,
    },
    /// Navigate elsewhere (cart, another step, an external URL). Errors
    /// accompanying the redirect are non-fatal notices the caller must
    /// still show (throttle warning, cart warnings, payment failures).
    Redirect {
        redirect: CheckoutRedirect,
        errors: Vec<CheckoutError>,
    },
    /// The order was placed; checkout is finished.
    Completed { order_id: Uuid },
}

/// Drives the ordered handler pipeline.
///
/// Transition rule: a `skip=true` result satisfies the step regardless of
/// `success`; `success=true` advances; `success=false` without skip stays
/// and redisplays. Handlers are evaluated in ascending `order`, and only
/// the handler owning the submitted route ever sees the request payload.
pub struct CheckoutWorkflow {
    handlers: Vec<Arc<dyn CheckoutHandler>>,
}

impl CheckoutWorkflow {
    /// Sorts by `order` and deduplicates by handler identity.
    pub fn new(mut handlers: Vec<Arc<dyn CheckoutHandler>>) -> Self {
        handlers.sort_by_key(|h| h.route().order);
        let mut seen: HashSet<HandlerIdentity> = HashSet::new();
        handlers.retain(|h| seen.insert(h.route().identity()));
        Self { handlers }
    }

    pub fn handlers(&self) -> &[Arc<dyn CheckoutHandler>] {
        &self.handlers
    }

    pub fn handler_for(&self, action: &str, controller: &str) -> Option<&Arc<dyn CheckoutHandler>> {
        self.handlers
            .iter()
            .find(|h| h.is_handler_for(action, controller))
    }

    /// GET navigation: walk forward from the first step to find how far the
    /// customer can auto-advance.
    #[instrument(skip(self, ctx))]
    pub async fn progress(
        &self,
        ctx: &mut CheckoutContext<'_>,
    ) -> Result<WorkflowOutcome, ServiceError> {
        self.advance_from(ctx, 0).await
    }

    /// Processes a submit against the single handler owning the route, then
    /// auto-advances past satisfied steps.
    #[instrument(skip(self, ctx, request), fields(action = %request.action))]
    pub async fn process(
        &self,
        ctx: &mut CheckoutContext<'_>,
        controller: &str,
        request: &StepRequest,
    ) -> Result<WorkflowOutcome, ServiceError> {
        let index = self
            .handlers
            .iter()
            .position(|h| h.is_handler_for(&request.action, controller))
            .ok_or_else(|| {
                ServiceError::NotFound(format!("no checkout step handles '{}'", request.action))
            })?;

        let handler = &self.handlers[index];
        let result = handler.process(ctx, Some(request)).await?;

        if let Some(redirect) = result.redirect {
            return Ok(Self::outcome_from_redirect(redirect, result.errors));
        }
        if !result.is_satisfied() {
            debug!(step = %handler.route().action, "step rejected the submission");
            return Ok(WorkflowOutcome::Redisplay {
                route: handler.route().clone(),
                errors: result.errors,
            });
        }

        self.advance_from(ctx, index + 1).await
    }

    async fn advance_from(
        &self,
        ctx: &mut CheckoutContext<'_>,
        start: usize,
    ) -> Result<WorkflowOutcome, ServiceError> {
        for handler in &self.handlers[start..] {
            let result = handler.process(ctx, None).await?;
            if let Some(redirect) = result.redirect {
                return Ok(Self::outcome_from_redirect(redirect, result.errors));
            }
            if result.is_satisfied() {
                continue;
            }
            return Ok(WorkflowOutcome::AtStep {
                route: handler.route().clone(),
                errors: result.errors,
            });
        }
        // Walked past the end of the pipeline; only possible when no
        // terminal step is registered.
        Ok(WorkflowOutcome::Redirect {
            redirect: CheckoutRedirect::Cart,
            errors: vec![],
        })
    }

    fn outcome_from_redirect(
        redirect: CheckoutRedirect,
        errors: Vec<CheckoutError>,
    ) -> WorkflowOutcome {
        match redirect {
            CheckoutRedirect::OrderComplete { order_id } => {
                WorkflowOutcome::Completed { order_id }
            }
            other => WorkflowOutcome::Redirect {
                redirect: other,
                errors,
            },
        }
    }
}
