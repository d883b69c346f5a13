//! Requester context extraction.
//!
//! Authentication itself lives in an external identity provider; the
//! gateway forwards the verified identity as trusted headers. This module
//! only reads that context, it never validates credentials.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::error::AppError;

/// Header carrying the authenticated user id, set by the identity gateway.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header flagging administrator sessions, set by the identity gateway.
pub const USER_ADMIN_HEADER: &str = "x-user-admin";

/// The authenticated requester of the current request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requester {
    pub id: Uuid,
    pub is_admin: bool,
}

impl Requester {
    pub fn new(id: Uuid, is_admin: bool) -> Self {
        Self { id, is_admin }
    }

    /// Fail with 403 unless the requester is an administrator.
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin {
            Ok(())
        } else {
            Err(AppError::Forbidden("Administrator access required".to_string()))
        }
    }
}

fn parse_requester(parts: &Parts) -> Result<Option<Requester>, AppError> {
    let Some(raw_id) = parts.headers.get(USER_ID_HEADER) else {
        return Ok(None);
    };

    let raw_id = raw_id
        .to_str()
        .map_err(|_| AppError::Unauthorized("Malformed user id header".to_string()))?;
    let id = Uuid::parse_str(raw_id)
        .map_err(|_| AppError::Unauthorized("Malformed user id header".to_string()))?;

    let is_admin = parts
        .headers
        .get(USER_ADMIN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false);

    Ok(Some(Requester { id, is_admin }))
}

impl<S> FromRequestParts<S> for Requester
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parse_requester(parts)?
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))
    }
}

/// Requester context for endpoints that are public but vary by viewer.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaybeRequester(pub Option<Requester>);

impl<S> FromRequestParts<S> for MaybeRequester
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeRequester(parse_requester(parts)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with_headers(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_missing_header_is_anonymous() {
        let parts = parts_with_headers(&[]);
        assert!(parse_requester(&parts).unwrap().is_none());
    }

    #[test]
    fn test_parses_user_and_admin_flag() {
        let id = Uuid::new_v4();
        let id_text = id.to_string();

        let parts = parts_with_headers(&[(USER_ID_HEADER, id_text.as_str())]);
        let requester = parse_requester(&parts).unwrap().unwrap();
        assert_eq!(requester.id, id);
        assert!(!requester.is_admin);

        let parts =
            parts_with_headers(&[(USER_ID_HEADER, id_text.as_str()), (USER_ADMIN_HEADER, "true")]);
        let requester = parse_requester(&parts).unwrap().unwrap();
        assert!(requester.is_admin);
    }

    #[test]
    fn test_malformed_id_is_rejected() {
        let parts = parts_with_headers(&[(USER_ID_HEADER, "not-a-uuid")]);
        assert!(parse_requester(&parts).is_err());
    }

    #[test]
    fn test_require_admin() {
        let admin = Requester::new(Uuid::new_v4(), true);
        let user = Requester::new(Uuid::new_v4(), false);
        assert!(admin.require_admin().is_ok());
        assert!(user.require_admin().is_err());
    }
}
