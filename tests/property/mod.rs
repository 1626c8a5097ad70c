// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests Module
//!
//! Placement and scheduling properties over randomly generated topologies.

mod placement_properties;
