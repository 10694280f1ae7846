// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use yare::parameterized;

fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
    Cli::try_parse_from(std::iter::once("fieldwatch").chain(args.iter().copied()))
}

#[test]
fn monitor_collects_participants() {
    let cli = parse(&[
        "monitor", "--trip", "rome", "--lat", "41.9", "--lng", "-12.5", "--radius", "0.5",
        "--participant", "s1=Ada Lovelace", "--participant", "s2",
    ])
    .unwrap();
    match cli.command {
        Command::Monitor { trip, lat, lng, radius, participants } => {
            assert_eq!(trip, "rome");
            assert_eq!((lat, lng, radius), (41.9, -12.5, 0.5));
            assert_eq!(participants, vec![Participant::new("s1", "Ada Lovelace"), Participant::new("s2", "s2")]);
        }
        _ => panic!("expected monitor"),
    }
}

#[parameterized(
    zero = { "0" },
    negative = { "-1" },
    not_a_number = { "wide" },
    infinite = { "inf" },
)]
fn monitor_rejects_bad_radius(radius: &str) {
    let args = ["monitor", "--trip", "t", "--lat", "0", "--lng", "0", "--radius", radius];
    assert!(parse(&args).is_err());
}

#[test]
fn monitor_rejects_empty_participant_name() {
    let args = ["monitor", "--trip", "t", "--lat", "0", "--lng", "0", "--radius", "1", "--participant", "s1="];
    assert!(parse(&args).is_err());
}

#[test]
fn roll_call_timeout_is_optional() {
    let cli = parse(&["roll-call", "--trip", "t1", "--supervisor", "sup"]).unwrap();
    assert!(matches!(cli.command, Command::RollCall { timeout: None, .. }));

    let cli = parse(&["roll-call", "--trip", "t1", "--supervisor", "sup", "--timeout", "90"]).unwrap();
    assert!(matches!(cli.command, Command::RollCall { timeout: Some(90), .. }));
    assert!(cli.command.is_long_running());

    assert!(parse(&["roll-call", "--trip", "t1", "--supervisor", "sup", "--timeout", "0"]).is_err());
}
