use crate::storage::LedgerStorage;
use crate::web::error::ApiError;
use crate::{Account, LedgerError, StockLedger};
use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Path, Request},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    Json,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use uuid::Uuid;

/// The logged-in account behind an `Authorization: Bearer <token>` header.
///
/// Rejects with 401 when the header is missing, malformed, or names a session
/// that was never opened or has been closed.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: Uuid,
    pub account: Account,
}

#[async_trait]
impl<S> FromRequestParts<Arc<StockLedger<S>>> for Session
where
    S: LedgerStorage + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        ledger: &Arc<StockLedger<S>>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(LedgerError::Unauthenticated)?;
        let account = ledger.session_account(&token).await?;
        Ok(Self { token, account })
    }
}

/// JSON request body. A missing, malformed, or mistyped body is a validation
/// error rather than axum's plain-text rejection.
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| LedgerError::validation(rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// Inventory item id taken from the path.
#[derive(Debug, Clone, Copy)]
pub struct ItemId(pub i32);

#[async_trait]
impl<S> FromRequestParts<S> for ItemId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<i32>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| LedgerError::validation(rejection.body_text()))?;
        Ok(Self(id))
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")?
        .trim()
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_parsing() {
        let token = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        assert_eq!(bearer_token(&headers), Some(token));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer not-a-token"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);
    }
}
