//! 认证中间件
//!
//! 为 JWT 认证和角色授权提供 Axum 中间件

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::auth::{CurrentUser, JwtError, JwtService};
use crate::core::ServerState;
use crate::security_log;
use crate::utils::{AppError, ErrorCode};

/// 认证中间件 - 解析可选的 Bearer 令牌
///
/// 排队相关的公共接口 (取号、查询、取消) 允许匿名访问，因此缺少
/// `Authorization` 头时直接放行，由角色中间件决定是否拒绝。
/// 携带了令牌但令牌无效时返回 401。
/// 验证成功后将 [`CurrentUser`] 注入请求扩展。
///
/// # 错误处理
///
/// | 错误 | HTTP 状态码 |
/// |------|------------|
/// | 头格式错误 | 401 TokenInvalid |
/// | 令牌过期 | 401 TokenExpired |
/// | 无效令牌 | 401 TokenInvalid |
pub async fn authenticate(
    State(state): State<ServerState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    // 允许 CORS 预检的 OPTIONS 请求
    if req.method() == http::Method::OPTIONS {
        return Ok(next.run(req).await);
    }

    let auth_header = req
        .headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let Some(header) = auth_header else {
        return Ok(next.run(req).await);
    };

    let token = JwtService::extract_from_header(header)
        .ok_or_else(|| AppError::invalid_token("Invalid authorization header"))?;

    let user = state
        .jwt_service
        .validate_token(token)
        .and_then(CurrentUser::try_from);

    match user {
        Ok(user) => {
            req.extensions_mut().insert(user);
            Ok(next.run(req).await)
        }
        Err(e) => {
            security_log!(
                "WARN",
                "auth_failed",
                error = format!("{}", e),
                uri = format!("{:?}", req.uri())
            );

            match e {
                JwtError::ExpiredToken => Err(AppError::token_expired()),
                _ => Err(AppError::invalid_token("Invalid token")),
            }
        }
    }
}

/// 员工中间件 - 要求 Staff 或 Admin 角色
///
/// 未登录返回 401，已登录但角色不足返回 403
pub async fn require_staff(req: Request, next: Next) -> Result<Response, AppError> {
    let Some(user) = req.extensions().get::<CurrentUser>() else {
        security_log!("WARN", "auth_missing", uri = format!("{:?}", req.uri()));
        return Err(AppError::not_authenticated());
    };
    if !user.role.is_staff() {
        return Err(AppError::new(ErrorCode::StaffRequired));
    }

    Ok(next.run(req).await)
}

/// 管理员中间件 - 要求 Admin 角色
pub async fn require_admin(req: Request, next: Next) -> Result<Response, AppError> {
    let Some(user) = req.extensions().get::<CurrentUser>() else {
        security_log!("WARN", "auth_missing", uri = format!("{:?}", req.uri()));
        return Err(AppError::not_authenticated());
    };
    if !user.is_admin() {
        security_log!(
            "WARN",
            "admin_required",
            user_id = user.id,
            username = user.username.clone(),
            uri = format!("{:?}", req.uri())
        );
        return Err(AppError::new(ErrorCode::AdminRequired));
    }

    Ok(next.run(req).await)
}
