//! Caller Extractor
//!
//! 将请求中的 [`CurrentUser`] (若有) 转换为业务层使用的 [`Caller`]

use axum::{extract::FromRequestParts, http::request::Parts};
use shared::models::Role;
use std::convert::Infallible;

use crate::auth::CurrentUser;

/// 业务操作的调用者
///
/// 所有需要角色检查的操作都显式接收 `Caller`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub id: u64,
    pub name: String,
    pub role: Role,
}

impl Caller {
    /// 匿名请求 (自助取号终端)
    pub fn anonymous() -> Self {
        Self {
            id: 0,
            name: String::new(),
            role: Role::Client,
        }
    }

    pub fn staff(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            role: Role::Staff,
        }
    }

    pub fn admin(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            role: Role::Admin,
        }
    }
}

impl From<&CurrentUser> for Caller {
    fn from(user: &CurrentUser) -> Self {
        Self {
            id: user.id,
            name: user.username.clone(),
            role: user.role,
        }
    }
}

/// 依赖 [`authenticate`](crate::auth::authenticate) 中间件先行注入 `CurrentUser`
impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<CurrentUser>()
            .map(Caller::from)
            .unwrap_or_else(Caller::anonymous))
    }
}
