mod auth;
mod health_check;
mod roles;

pub use auth::{
    login, logout, profile, refresh, register, AuthResponse, LoginRequest, LogoutRequest,
    RefreshRequest, RegisterRequest, RegisterResponse,
};
pub use health_check::health_check;
pub use roles::{admin_ping, doctor_ping, patient_ping};
