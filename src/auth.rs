use std::future::Future;
use std::pin::Pin;

use actix_web::dev::Payload;
use actix_web::{web, FromRequest, HttpRequest};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use http::header::{HeaderValue, AUTHORIZATION};
use tracing::debug;

use crate::db::{self, DbPool};
use crate::error::AppError;
use crate::schema::auth_tokens;

const TOKEN_KEYWORD: &str = "token";

/// The caller of a request, resolved from its `Authorization: Token <key>` header.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Identity(Option<i32>);

impl Identity {
    pub fn anonymous() -> Self {
        Identity(None)
    }

    pub fn user(id: i32) -> Self {
        Identity(Some(id))
    }

    pub fn is_authenticated(&self) -> bool {
        self.0.is_some()
    }

    pub fn user_id(&self) -> Option<i32> {
        self.0
    }

    pub fn require(&self) -> Result<i32, AppError> {
        self.0.ok_or(AppError::Unauthenticated)
    }
}

/// Returns the token key, `None` when the request carries no token
/// credentials at all.
pub fn token_from_header(value: Option<&HeaderValue>) -> Result<Option<String>, AppError> {
    let value = match value {
        Some(v) => v.to_str().map_err(|_| AppError::Unauthenticated)?,
        None => return Ok(None),
    };
    let mut parts = value.split_whitespace();
    match parts.next() {
        Some(scheme) if scheme.eq_ignore_ascii_case(TOKEN_KEYWORD) => {}
        _ => return Ok(None),
    }
    match (parts.next(), parts.next()) {
        (Some(key), None) => Ok(Some(key.to_string())),
        _ => Err(AppError::Unauthenticated),
    }
}

fn lookup_token(conn: &mut PgConnection, key: &str) -> Result<Option<i32>, AppError> {
    let user_id = auth_tokens::table
        .find(key)
        .select(auth_tokens::user_id)
        .first::<i32>(conn)
        .optional()?;
    Ok(user_id)
}

impl FromRequest for Identity {
    type Error = AppError;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let token = token_from_header(req.headers().get(AUTHORIZATION));
        let pool = req
            .app_data::<web::Data<DbPool>>()
            .map(|pool| pool.get_ref().clone());

        Box::pin(async move {
            let key = match token? {
                Some(key) => key,
                None => return Ok(Identity::anonymous()),
            };
            let pool =
                pool.ok_or_else(|| AppError::Internal("database pool is not configured".into()))?;
            match db::run(&pool, move |conn| lookup_token(conn, &key)).await? {
                Some(user_id) => Ok(Identity::user(user_id)),
                None => {
                    debug!("rejected unknown token");
                    Err(AppError::Unauthenticated)
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    fn header(value: &'static str) -> HeaderValue {
        HeaderValue::from_static(value)
    }

    #[test]
    fn parses_token_header() {
        let value = header("Token 9944b09199c62bcf9418ad846dd0e4bbdfc6ee4b");
        assert_eq!(
            token_from_header(Some(&value)).unwrap().as_deref(),
            Some("9944b09199c62bcf9418ad846dd0e4bbdfc6ee4b")
        );
        let value = header("token abc");
        assert_eq!(token_from_header(Some(&value)).unwrap().as_deref(), Some("abc"));
    }

    #[test]
    fn other_schemes_are_anonymous() {
        assert_eq!(token_from_header(None).unwrap(), None);
        let value = header("Bearer abc");
        assert_eq!(token_from_header(Some(&value)).unwrap(), None);
    }

    #[test]
    fn malformed_token_is_rejected() {
        for raw in &["Token", "Token a b"] {
            let value = HeaderValue::from_str(raw).unwrap();
            assert!(matches!(
                token_from_header(Some(&value)),
                Err(AppError::Unauthenticated)
            ));
        }
    }

    #[test]
    fn require_needs_a_user() {
        assert!(matches!(
            Identity::anonymous().require(),
            Err(AppError::Unauthenticated)
        ));
        assert_eq!(Identity::user(7).require().unwrap(), 7);
        assert!(Identity::user(7).is_authenticated());
    }

    #[actix_rt::test]
    async fn no_header_extracts_anonymous() {
        let req = TestRequest::default().to_http_request();
        let identity = Identity::extract(&req).await.unwrap();
        assert_eq!(identity, Identity::anonymous());
    }

    #[actix_rt::test]
    async fn malformed_header_fails_before_the_database() {
        let req = TestRequest::default()
            .insert_header((AUTHORIZATION, "Token"))
            .to_http_request();
        assert!(matches!(
            Identity::extract(&req).await,
            Err(AppError::Unauthenticated)
        ));
    }
}
