//! Request extractors that reject with a [DaybookError] instead of axum's
//! plain-text rejections, so every error the API returns is JSON.

use axum::body::HttpBody;
use axum::extract::{FromRequest, Path, Query, RequestParts};
use axum::{BoxError, Json};
use serde::de::DeserializeOwned;

use crate::error::DaybookError;

/// A JSON request body.
pub struct JsonBody<T>(pub T);

#[async_trait::async_trait]
impl<T, B> FromRequest<B> for JsonBody<T>
where
    T: DeserializeOwned,
    B: HttpBody + Send,
    B::Data: Send,
    B::Error: Into<BoxError>,
{
    type Rejection = DaybookError;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req)
            .await
            .map_err(|rejection| DaybookError::BadRequest(rejection.to_string()))?;

        Ok(Self(value))
    }
}

/// A deserialized query string.
pub struct QueryParams<T>(pub T);

#[async_trait::async_trait]
impl<T, B> FromRequest<B> for QueryParams<T>
where
    T: DeserializeOwned,
    B: Send,
{
    type Rejection = DaybookError;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request(req)
            .await
            .map_err(|rejection| DaybookError::BadRequest(rejection.to_string()))?;

        Ok(Self(value))
    }
}

/// The numeric `:id` segment of a route.
pub struct IdPath(pub i64);

#[async_trait::async_trait]
impl<B: Send> FromRequest<B> for IdPath {
    type Rejection = DaybookError;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<i64>::from_request(req)
            .await
            .map_err(|rejection| DaybookError::BadRequest(rejection.to_string()))?;

        Ok(Self(id))
    }
}
