mod guards;
mod json_error;
mod panic;

pub(crate) use guards::bearer_token;
pub use guards::{AuthContext, RbacManage, RequirePermission, RequiredPermission};
pub use json_error::json_error_middleware;
pub use panic::catch_panic_layer;
