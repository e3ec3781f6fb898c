// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! NitroAuth - Centralized Authentication Broker
//!
//! This crate sits between the identity provider and a fleet of satellite
//! applications: it decides who may enter which site, mints short-lived
//! signed tokens, and validates them against fresh principal state.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - roles, permission targets, token codec, decision services
//! - `storage` - embedded redb database (principals, sites, audit trail)
//! - `ratelimit` - fixed-window limiter shared by the decision paths

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod ratelimit;
pub mod state;
pub mod storage;
