// ABOUTME: Request extractors that turn axum rejections into the API's JSON error envelope
// ABOUTME: Wraps Json, Query and Path so malformed input surfaces as INVALID_INPUT
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hojaega.pk

use crate::errors::AppError;
use axum::extract::{FromRequest, FromRequestParts};

/// JSON body extractor rejecting with [`AppError`]
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Query string extractor rejecting with [`AppError`]
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// Path parameter extractor rejecting with [`AppError`]
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);
