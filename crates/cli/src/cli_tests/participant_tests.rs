// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use fw_core::BatteryStatus;
use yare::parameterized;

fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
    Cli::try_parse_from(std::iter::once("fieldwatch").chain(args.iter().copied()))
}

#[test]
fn join_takes_participant_and_trip() {
    let cli = parse(&["join", "--participant", "s1", "--trip", "rome", "--name", "Ada"]).unwrap();
    match cli.command {
        Command::Join { participant, trip, name } => {
            assert_eq!(participant, "s1");
            assert_eq!(trip, "rome");
            assert_eq!(name.as_deref(), Some("Ada"));
        }
        _ => panic!("expected join"),
    }
}

#[parameterized(
    missing_trip = { &["join", "--participant", "s1"] },
    blank_participant = { &["join", "--participant", " ", "--trip", "rome"] },
    unknown_consent = { &["consent", "maybe"] },
    run_without_fixes = { &["run"] },
    bad_battery = { &["run", "--fixes", "t.jsonl", "--battery", "fixed:2"] },
)]
fn rejects(args: &[&str]) {
    assert!(parse(args).is_err());
}

#[test]
fn state_dir_is_global() {
    let cli = parse(&["consent", "status", "--state-dir", "/tmp/fw"]).unwrap();
    assert_eq!(cli.state_dir, Some(PathBuf::from("/tmp/fw")));
    assert!(matches!(cli.command, Command::Consent(ConsentCommand::Status)));
}

#[test]
fn run_defaults_to_no_battery() {
    let cli = parse(&["run", "--fixes", "track.jsonl"]).unwrap();
    match cli.command {
        Command::Run { fixes, repeat, battery } => {
            assert_eq!(fixes, PathBuf::from("track.jsonl"));
            assert!(!repeat);
            assert_eq!(battery, BatterySpec::None);
        }
        _ => panic!("expected run"),
    }
    assert!(parse(&["run", "--fixes", "t.jsonl"]).unwrap().command.is_long_running());
}

#[test]
fn run_parses_fixed_battery() {
    let cli = parse(&["run", "--fixes", "t.jsonl", "--battery", "fixed:0.15:charging", "--repeat"]).unwrap();
    match cli.command {
        Command::Run { battery, repeat, .. } => {
            assert!(repeat);
            assert_eq!(battery, BatterySpec::Fixed(BatteryStatus::new(0.15, true).unwrap()));
        }
        _ => panic!("expected run"),
    }
}

#[test]
fn one_shot_commands() {
    for args in [&["respond"][..], &["leave"], &["queue", "status"], &["consent", "grant"]] {
        assert!(!parse(args).unwrap().command.is_long_running(), "{args:?}");
    }
}
