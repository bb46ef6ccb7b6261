pub mod auth;
pub mod response;

pub use auth::{current_identity, AdminSession, Authorized, EmployeeSession, FieldExecSession, RoleGate, UserSession};
pub use response::{ApiResponse, ApiResult};
