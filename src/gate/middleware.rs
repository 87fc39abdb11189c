use super::{headers, GateDecision, GateRequest, RequestGate};
use crate::error::GatewayError;
use crate::metrics;
use crate::rate_limit::client_identifier;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::warn;

/// Per-response nonce, available to handlers through request extensions
#[derive(Debug, Clone)]
pub struct CspNonce(pub String);

/// Axum middleware running the gate in front of every route
pub async fn gate_middleware(
    State(gate): State<Arc<RequestGate>>,
    mut request: Request,
    next: Next,
) -> Response {
    let decision = gate.evaluate(&GateRequest::from_request(&request));

    match decision {
        GateDecision::Reject(rejection) => {
            warn!(
                reason = %rejection.reason,
                status = rejection.status.as_u16(),
                method = %request.method(),
                path = %request.uri().path(),
                client = %client_identifier(request.headers()),
                "Request rejected by gate"
            );
            metrics::record_gate_rejection(rejection.reason.as_str());

            let mut response = GatewayError::RequestRejected(rejection.reason).into_response();
            headers::merge_headers(response.headers_mut(), &headers::security_headers());
            response
        }
        GateDecision::Forward(plan) => {
            request
                .extensions_mut()
                .insert(CspNonce(plan.nonce.clone()));

            let mut response = next.run(request).await;
            plan.apply(response.headers_mut());
            response
        }
    }
}
