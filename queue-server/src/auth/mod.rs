//! 认证授权模块
//!
//! 提供 JWT 认证、角色检查和中间件：
//! - [`JwtService`] - JWT 令牌服务
//! - [`CurrentUser`] - 已登录员工上下文
//! - [`Caller`] - 业务层看到的调用者 (匿名请求为 `Role::Client`)
//! - [`authenticate`] - 解析可选的 Bearer 令牌
//! - [`require_staff`] / [`require_admin`] - 角色检查中间件

pub mod extractor;
pub mod jwt;
pub mod middleware;

pub use extractor::Caller;
pub use jwt::{Claims, CurrentUser, JwtConfig, JwtError, JwtService};
pub use middleware::{authenticate, require_admin, require_staff};
