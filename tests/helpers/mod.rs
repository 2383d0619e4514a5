// ABOUTME: Shared test helpers for HTTP-level integration tests
// ABOUTME: Exports the oneshot request builder used against the application router
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hojaega.pk

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

pub mod axum_test;
