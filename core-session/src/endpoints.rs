//! Well-known backend endpoint paths.
//!
//! Centralized to avoid magic strings at call sites. Only the auth family
//! lives here; resource endpoints belong to the callers that use them.

pub const AUTH_LOGIN: &str = "/api/auth/login";
pub const AUTH_REFRESH: &str = "/api/auth/refresh";
pub const AUTH_LOGOUT: &str = "/api/auth/logout";
pub const AUTH_ME: &str = "/api/auth/me";
pub const AUTH_FORGOT_PASSWORD: &str = "/api/auth/forgot-password";
pub const AUTH_SUBMIT_PASSWORD_RESET: &str = "/api/auth/submitPasswordReset";
