/// JWT Authentication Middleware
///
/// Validates the bearer token from the Authorization header, injects the
/// claims into request extensions for handlers (`web::ReqData<Claims>`),
/// and optionally requires a role claim.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;
use std::sync::Arc;

use crate::auth::TokenSigner;
use crate::error::{AppError, AuthError};
use crate::users::Role;

/// JWT middleware for protecting routes
///
/// Missing or invalid tokens answer 401; a valid token without the
/// required role answers 403.
pub struct JwtMiddleware {
    signer: Arc<TokenSigner>,
    required_role: Option<Role>,
}

impl JwtMiddleware {
    pub fn new(signer: Arc<TokenSigner>) -> Self {
        Self {
            signer,
            required_role: None,
        }
    }

    /// Only let through tokens whose role claim is `role`
    pub fn require_role(mut self, role: Role) -> Self {
        self.required_role = Some(role);
        self
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = JwtMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(JwtMiddlewareService {
            service: Rc::new(service),
            signer: self.signer.clone(),
            required_role: self.required_role,
        }))
    }
}

pub struct JwtMiddlewareService<S> {
    service: Rc<S>,
    signer: Arc<TokenSigner>,
    required_role: Option<Role>,
}

/// Token part of an `Authorization: Bearer <token>` header
fn bearer_token(req: &ServiceRequest) -> Option<String> {
    req.headers()
        .get(actix_web::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

fn reject<B: 'static>(
    error: AppError,
) -> LocalBoxFuture<'static, Result<ServiceResponse<B>, Error>> {
    let error: Error = error.into();
    Box::pin(async move { Err(error) })
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let token = match bearer_token(&req) {
            Some(token) => token,
            None => {
                tracing::debug!(path = %req.path(), "Missing or invalid Authorization header");
                return reject(AppError::Auth(AuthError::MissingToken));
            }
        };

        let claims = match self.signer.validate(&token) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!(path = %req.path(), "JWT validation failed: {}", e);
                return reject(AppError::Auth(e));
            }
        };

        if let Some(role) = self.required_role {
            if !claims.has_role(role) {
                tracing::info!(
                    user_id = %claims.sub,
                    role = %claims.role,
                    required_role = %role,
                    "Role check failed"
                );
                return reject(AppError::Forbidden(role.to_string()));
            }
        }

        tracing::debug!(user_id = %claims.sub, role = %claims.role, "JWT validated successfully");
        req.extensions_mut().insert(claims);

        let service = self.service.clone();
        Box::pin(async move { service.call(req).await })
    }
}
