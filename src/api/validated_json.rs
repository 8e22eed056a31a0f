//! JSON extractor that runs `validator` rules after deserialization.

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::error::ApiError;

/// Like [`axum::Json`], but rejects bodies that fail their `Validate` rules
/// with a `VALIDATION_ERROR` listing the offending fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidateJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidateJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(data) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| ApiError::bad_request(rejection.body_text()))?;

        data.validate()?;
        Ok(Self(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header::CONTENT_TYPE, StatusCode};
    use serde::Deserialize;

    #[derive(Debug, Deserialize, Validate)]
    struct Payload {
        #[validate(length(min = 1, max = 10))]
        name: String,
        #[validate(range(min = 0.0))]
        amount: f64,
    }

    fn json_request(body: &str) -> Request {
        Request::builder()
            .method("POST")
            .uri("/")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn accepts_valid_payload() {
        let ValidateJson(payload) =
            ValidateJson::<Payload>::from_request(json_request(r#"{"name":"kale","amount":2.5}"#), &())
                .await
                .unwrap();
        assert_eq!(payload.name, "kale");
    }

    #[tokio::test]
    async fn reports_each_invalid_field() {
        let err = ValidateJson::<Payload>::from_request(
            json_request(r#"{"name":"","amount":-1}"#),
            &(),
        )
        .await
        .unwrap_err();

        match err {
            ApiError::Validation(details) => {
                assert!(details.get("name").is_some());
                assert!(details.get("amount").is_some());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_json_is_a_bad_request() {
        let err = ValidateJson::<Payload>::from_request(json_request("{not json"), &())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}
