// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Roll-call rounds.
//!
//! The supervisor's [`Coordinator`] opens a round, counts down and collects
//! the responses pushed on the supervisor topic. Each participant's
//! [`Responder`] learns about the round from the start broadcast or from
//! polling the store, and records one response per round.

mod coordinator;
mod responder;

pub use coordinator::{run_round, Coordinator, OpenRound};
pub use responder::{run_responder, ActiveRound, RespondOutcome, Responder, ResponderUpdate, RoundChange};
