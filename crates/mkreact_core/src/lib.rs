/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

pub mod actuator;
pub mod api;
pub mod config;
pub mod engagement;
pub mod model;
pub mod note_sync;
pub mod orchestrator;
pub mod reaction_sync;
pub mod report;
pub mod store;

#[cfg(test)]
mod test_support;
