pub mod jwt;
pub mod middleware;
pub mod password;

pub use jwt::{AuthError, JwtService, SessionClaims};
pub use middleware::{
    jwt_middleware, AdminUser, AuthRejection, AuthState, CurrentUser, ErrorResponse,
};
pub use password::{hash_password, verify_password, PasswordError};
