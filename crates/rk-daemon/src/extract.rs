// SPDX-License-Identifier: MIT OR Apache-2.0
//! Body extractors whose rejections are failures.

use crate::error::ApiError;
use axum::{
    Form, Json,
    extract::{FromRequest, Request},
};
use rk_error::Failure;
use serde::de::DeserializeOwned;

/// `Json<T>` that rejects with an `HttpError` failure.
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => {
                let status = rejection.status().as_u16();
                Err(Failure::http(status, rejection.body_text()).into())
            }
        }
    }
}

/// `Form<T>` that rejects with an `HttpError` failure.
#[derive(Debug, Clone)]
pub struct FormBody<T>(pub T);

impl<S, T> FromRequest<S> for FormBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Form::<T>::from_request(req, state).await {
            Ok(Form(value)) => Ok(Self(value)),
            Err(rejection) => {
                let status = rejection.status().as_u16();
                Err(Failure::http(status, rejection.body_text()).into())
            }
        }
    }
}
