use std::collections::BTreeMap;

use actix_web::error::BlockingError;
use actix_web::{HttpResponse, ResponseError};
use diesel::r2d2::PoolError;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use http::header::WWW_AUTHENTICATE;
use http::StatusCode;
use thiserror::Error;
use tracing::error;

/// Messages keyed by the request field they refer to.
pub type FieldErrors = BTreeMap<&'static str, Vec<String>>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("authentication credentials were not provided or are invalid")]
    Unauthenticated,

    #[error("{0}")]
    PermissionDenied(&'static str),

    #[error("{0}")]
    Conflict(&'static str),

    #[error("invalid input")]
    Validation(FieldErrors),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        let mut fields = FieldErrors::new();
        fields.insert(field, vec![message.into()]);
        AppError::Validation(fields)
    }
}

#[derive(Serialize)]
struct Detail<'a> {
    detail: &'a str,
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut builder = HttpResponse::build(self.status_code());
        match self {
            AppError::Validation(fields) => builder.json(fields),
            AppError::Internal(_) => builder.json(Detail {
                detail: "internal server error",
            }),
            AppError::Unauthenticated => builder
                .insert_header((WWW_AUTHENTICATE, "Token"))
                .json(Detail {
                    detail: &self.to_string(),
                }),
            _ => builder.json(Detail {
                detail: &self.to_string(),
            }),
        }
    }
}

impl From<DieselError> for AppError {
    fn from(e: DieselError) -> Self {
        match e {
            DieselError::NotFound => AppError::NotFound("object"),
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                AppError::Conflict("object already exists")
            }
            DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
                AppError::invalid("non_field_errors", info.message())
            }
            DieselError::DatabaseError(DatabaseErrorKind::CheckViolation, info) => {
                AppError::invalid("non_field_errors", info.message())
            }
            e => {
                error!("database error: {}", e);
                AppError::Internal(e.to_string())
            }
        }
    }
}

impl From<PoolError> for AppError {
    fn from(e: PoolError) -> Self {
        error!("failed to get a pooled connection: {}", e);
        AppError::Internal(e.to_string())
    }
}

impl From<BlockingError> for AppError {
    fn from(e: BlockingError) -> Self {
        error!("blocking task failed: {}", e);
        AppError::Internal(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;
    use diesel::result::DatabaseErrorInformation;

    struct Info(&'static str);

    impl DatabaseErrorInformation for Info {
        fn message(&self) -> &str {
            self.0
        }
        fn details(&self) -> Option<&str> {
            None
        }
        fn hint(&self) -> Option<&str> {
            None
        }
        fn table_name(&self) -> Option<&str> {
            None
        }
        fn column_name(&self) -> Option<&str> {
            None
        }
        fn constraint_name(&self) -> Option<&str> {
            None
        }
        fn statement_position(&self) -> Option<i32> {
            None
        }
    }

    #[test]
    fn each_kind_has_its_own_status() {
        let cases = vec![
            (AppError::NotFound("recipe"), 404),
            (AppError::Unauthenticated, 401),
            (AppError::PermissionDenied("nope"), 403),
            (AppError::Conflict("twice"), 409),
            (AppError::invalid("name", "empty"), 400),
            (AppError::Internal("boom".into()), 500),
        ];
        for (err, status) in cases {
            assert_eq!(err.status_code().as_u16(), status, "{:?}", err);
        }
    }

    #[test]
    fn diesel_errors_are_classified() {
        assert!(matches!(
            AppError::from(DieselError::NotFound),
            AppError::NotFound(_)
        ));
        let unique = DieselError::DatabaseError(
            DatabaseErrorKind::UniqueViolation,
            Box::new(Info("duplicate key")),
        );
        assert!(matches!(AppError::from(unique), AppError::Conflict(_)));
        let fk = DieselError::DatabaseError(
            DatabaseErrorKind::ForeignKeyViolation,
            Box::new(Info("missing tag")),
        );
        match AppError::from(fk) {
            AppError::Validation(fields) => {
                assert_eq!(fields["non_field_errors"], vec!["missing tag".to_string()])
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            AppError::from(DieselError::RollbackTransaction),
            AppError::Internal(_)
        ));
    }

    #[actix_rt::test]
    async fn validation_body_lists_fields() {
        let mut fields = FieldErrors::new();
        fields.insert("tags", vec!["must not be empty".to_string()]);
        fields.insert("cooking_time", vec!["must be at least 1".to_string()]);
        let resp = AppError::Validation(fields).error_response();
        let body = to_bytes(resp.into_body()).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["tags"][0], "must not be empty");
        assert_eq!(value["cooking_time"][0], "must be at least 1");
    }

    #[actix_rt::test]
    async fn internal_details_are_not_leaked() {
        let resp = AppError::Internal("password=hunter2".into()).error_response();
        let body = to_bytes(resp.into_body()).await.unwrap();
        assert_eq!(&body[..], br#"{"detail":"internal server error"}"#);
    }

    #[test]
    fn unauthenticated_challenges_for_a_token() {
        let resp = AppError::Unauthenticated.error_response();
        assert_eq!(resp.headers().get(WWW_AUTHENTICATE).unwrap(), "Token");
    }
}
