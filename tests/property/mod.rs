// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests Module
//!
//! Role resolution and stage planning over arbitrary inputs.

mod plan;
mod topology;
