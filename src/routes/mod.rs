pub mod api;
mod entry;
pub mod middleware;
pub mod response;

pub use entry::{API_PREFIX, router};
pub use middleware::{
    AuthContext, RbacManage, RequirePermission, RequiredPermission, catch_panic_layer,
    json_error_middleware,
};
pub use response::{ApiResult, JsonApiResponse};
