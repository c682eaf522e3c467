/// Middleware module
///
/// Bearer-token authentication with optional role requirements.

mod jwt_middleware;

pub use jwt_middleware::JwtMiddleware;
