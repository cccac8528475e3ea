//! Per-request transactions for actix scopes.
//!
//! Every request passing through [`Transactional`] runs inside its own
//! [`ActiveTransaction`](crate::domain::ActiveTransaction). Handlers reach the
//! transaction by extracting [`TransactionContext`].

use std::future::Future;
use std::rc::Rc;
use std::task::{Context, Poll};

use actix_web::dev::{Payload, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{Error, FromRequest, HttpMessage, HttpRequest};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use tracing::debug;

use crate::domain::ports::{
    ResourceManager, TransactionContext, TransactionError, TransactionHandle,
};
use crate::domain::{Failure, UnitOfWork};

type ContextOf<M> =
    TransactionContext<<<M as ResourceManager>::Handle as TransactionHandle>::Context>;

/// Middleware opening one transaction per request.
///
/// Responses below 400 without an attached error commit; everything else,
/// including a handler that outlives the unit of work's timeout, rolls back.
/// The response or error produced by the inner service is returned as is.
pub struct Transactional<M> {
    unit: UnitOfWork<M>,
}

impl<M> Transactional<M> {
    /// Middleware backed by `unit`.
    pub const fn new(unit: UnitOfWork<M>) -> Self {
        Self { unit }
    }
}

impl<M> Clone for Transactional<M> {
    fn clone(&self) -> Self {
        Self {
            unit: self.unit.clone(),
        }
    }
}

impl<S, B, M> Transform<S, ServiceRequest> for Transactional<M>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
    M: ResourceManager,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = TransactionalMiddleware<S, M>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(TransactionalMiddleware {
            service: Rc::new(service),
            unit: self.unit.clone(),
        }))
    }
}

/// Service wrapper produced by [`Transactional`].
pub struct TransactionalMiddleware<S, M> {
    service: Rc<S>,
    unit: UnitOfWork<M>,
}

/// Why a request's transaction must roll back.
enum RequestFailure<B> {
    /// The inner service produced an error response.
    Response(ServiceResponse<B>),
    /// The inner service failed outright.
    Service(Error),
    /// The unit of work itself failed.
    Transaction(TransactionError),
}

impl<B> From<TransactionError> for RequestFailure<B> {
    fn from(value: TransactionError) -> Self {
        Self::Transaction(value)
    }
}

async fn settle<F, B>(fut: F) -> Result<ServiceResponse<B>, RequestFailure<B>>
where
    F: Future<Output = Result<ServiceResponse<B>, Error>>,
{
    match fut.await {
        Ok(res) if res.status().as_u16() >= 400 || res.response().error().is_some() => {
            Err(RequestFailure::Response(res))
        }
        Ok(res) => Ok(res),
        Err(err) => Err(RequestFailure::Service(err)),
    }
}

impl<S, B, M> Service<ServiceRequest> for TransactionalMiddleware<S, M>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
    M: ResourceManager,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let unit = self.unit.clone();
        Box::pin(async move {
            let transaction = unit.begin().await.map_err(Failure::from)?;
            req.extensions_mut().insert(transaction.context());

            let outcome = unit.bounded(settle(service.call(req))).await;
            match &outcome {
                Ok(res) | Err(RequestFailure::Response(res)) => {
                    res.request().extensions_mut().remove::<ContextOf<M>>();
                }
                // The inner future, and with it the request, is already gone.
                Err(RequestFailure::Service(_) | RequestFailure::Transaction(_)) => {}
            }

            match transaction.finish(outcome).await {
                Ok(res) | Err(RequestFailure::Response(res)) => Ok(res),
                Err(RequestFailure::Service(err)) => Err(err),
                Err(RequestFailure::Transaction(err)) => {
                    debug!(error = %err, kind = err.label(), "unit of work failed");
                    Err(Failure::from(err).into())
                }
            }
        })
    }
}

impl<C: Clone + 'static> FromRequest for TransactionContext<C> {
    type Error = Failure;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<Self>()
                .cloned()
                .ok_or_else(|| Failure::internal("transaction context missing")),
        )
    }
}
