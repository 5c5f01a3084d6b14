// SPDX-FileCopyrightText: 2025 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use std::fmt::Display;

use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http_body_util::Full;
use hyper::{StatusCode, body::Bytes};
use serde::Serialize;

/// Status code and optional JSON body of an answer.
pub struct Reply {
    status: StatusCode,
    json: Option<Bytes>,
}

#[derive(Serialize, Debug)]
struct BadRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    column: Option<usize>,
    message: String,
}

impl Reply {
    pub fn empty(status: StatusCode) -> Self {
        Self { status, json: None }
    }

    pub fn json<T>(status: StatusCode, value: &T) -> Self
    where
        T: Serialize,
    {
        match serde_json::to_vec(value) {
            Ok(body) => Self {
                status,
                json: Some(body.into()),
            },
            Err(e) => Self::internal_error(e),
        }
    }

    pub fn internal_error<E>(error: E) -> Self
    where
        E: Display,
    {
        tracing::warn!(%error, "unable to answer request");
        Self::empty(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn bad_request<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        let body = BadRequest {
            line: None,
            column: None,
            message: message.into(),
        };
        Self::json(StatusCode::BAD_REQUEST, &body)
    }

    pub fn into_response(self) -> hyper::Response<Full<Bytes>> {
        let builder = hyper::Response::builder().status(self.status);
        let built = match self.json {
            Some(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .header(CONTENT_LENGTH, body.len())
                .body(Full::new(body)),
            None => builder.body(Full::default()),
        };
        built.unwrap_or_else(|error| {
            tracing::warn!(%error, "unable to build response");
            let mut response = hyper::Response::new(Full::default());
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        })
    }
}

/// Invalid JSON is answered with the position of the error.
impl From<serde_json::Error> for Reply {
    fn from(error: serde_json::Error) -> Self {
        let body = BadRequest {
            line: Some(error.line()),
            column: Some(error.column()),
            message: error.to_string(),
        };
        Self::json(StatusCode::BAD_REQUEST, &body)
    }
}
