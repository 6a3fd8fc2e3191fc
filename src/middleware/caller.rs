//! Caller identity.
//!
//! Authentication happens upstream; the authenticated user id arrives as the
//! `x-user-id` header. A missing header means an anonymous caller.
use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::AppError;

pub const USER_ID_HEADER: &str = "x-user-id";

/// Caller that may be anonymous
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaybeUser(pub Option<i64>);

/// Caller that must be identified; rejects with 401 otherwise
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser(pub i64);

fn user_id_from(parts: &Parts) -> Result<Option<i64>, AppError> {
    let Some(value) = parts.headers.get(USER_ID_HEADER) else {
        return Ok(None);
    };

    value
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse::<i64>().ok())
        .map(Some)
        .ok_or(AppError::Unauthorized)
}

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        user_id_from(parts).map(MaybeUser)
    }
}

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        user_id_from(parts)?
            .map(CurrentUser)
            .ok_or(AppError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(USER_ID_HEADER, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn test_maybe_user() {
        let mut anonymous = parts(None);
        assert_eq!(
            MaybeUser::from_request_parts(&mut anonymous, &()).await.unwrap(),
            MaybeUser(None)
        );

        let mut known = parts(Some(" 42 "));
        assert_eq!(
            MaybeUser::from_request_parts(&mut known, &()).await.unwrap(),
            MaybeUser(Some(42))
        );
    }

    #[tokio::test]
    async fn test_current_user_requires_header() {
        let mut anonymous = parts(None);
        assert!(matches!(
            CurrentUser::from_request_parts(&mut anonymous, &()).await,
            Err(AppError::Unauthorized)
        ));

        let mut garbage = parts(Some("abc"));
        assert!(matches!(
            CurrentUser::from_request_parts(&mut garbage, &()).await,
            Err(AppError::Unauthorized)
        ));
    }
}
