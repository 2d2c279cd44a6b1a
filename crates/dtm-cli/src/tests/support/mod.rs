//! Test support utilities for `dtm` behavioural coverage.
//!
//! Supplies a scripted HTTP service, a fixed configuration loader and a
//! world that runs the CLI with captured output, so step definitions and
//! unit tests stay focused on their assertions.

mod fake_service;

use std::cell::RefCell;
use std::ffi::OsString;
use std::io::Cursor;
use std::process::ExitCode;

use anyhow::{Context, Result, ensure};
use dtm_config::Config;
use rstest::fixture;

use crate::{AppError, ConfigLoader, IoStreams, run_with_loader};

pub(super) use fake_service::{CannedResponse, FakeService};

/// Attribute rows returned for the `person` namespace.
pub(super) const PERSON_ATTRIBUTES: &str = "[[:person/name :db.type/string :db.cardinality/one] \
     [:person/age :db.type/long :db.cardinality/one]]";

/// Entity rows returned for the `person` namespace.
pub(super) const PERSON_ROWS: &str = "[[17592186045418 \"Ann\" 30] [17592186045419 \"Bob\" 41]]";

pub(super) const PERSON_TABLE: &str = concat!(
    " ┌────────────────┬──────────────┬─────────────┐\n",
    " │ ?db-id         │ ?person-name │ ?person-age │ \n",
    " ├────────────────┼──────────────┼─────────────┤\n",
    " │ 17592186045418 │ Ann          │ 30          │ \n",
    " │ 17592186045419 │ Bob          │ 41          │ \n",
    " └────────────────┴──────────────┴─────────────┘\n",
);

/// A config loader that returns a fixed configuration for tests.
pub(super) struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    pub(super) fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self, _args: &[OsString]) -> Result<Config, AppError> {
        Ok(self.config.clone())
    }
}

/// Test world holding CLI state, the fake service and captured output.
#[derive(Default)]
pub(super) struct TestWorld {
    pub config: Config,
    pub service: Option<FakeService>,
    pub stdin: Vec<u8>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: Option<ExitCode>,
    pub requests: Vec<String>,
}

impl TestWorld {
    /// Starts a service replying with `responses` and points the config at
    /// it, selecting the `dev` alias and `seattle` database.
    pub fn start_service(&mut self, responses: Vec<CannedResponse>) -> Result<()> {
        let service = FakeService::spawn(responses)?;
        self.config.host = Some(service.url());
        self.config.alias = Some(String::from("dev"));
        self.config.db = Some(String::from("seattle"));
        self.service = Some(service);
        Ok(())
    }

    pub fn run(&mut self, command: &str) -> Result<()> {
        self.stdout.clear();
        self.stderr.clear();
        self.requests.clear();
        let args = build_args(command);
        let loader = StaticConfigLoader::new(self.config.clone());
        let mut stdin = Cursor::new(self.stdin.clone());
        let mut io = IoStreams::new(&mut stdin, &mut self.stdout, &mut self.stderr, false);
        let exit = run_with_loader(args, &mut io, &loader);
        self.exit_code = Some(exit);
        if let Some(service) = self.service.as_mut() {
            self.requests = service.take_requests()?;
        }
        Ok(())
    }

    pub fn stdout_text(&self) -> Result<String> {
        String::from_utf8(self.stdout.clone()).context("stdout utf8")
    }

    pub fn stderr_text(&self) -> Result<String> {
        String::from_utf8(self.stderr.clone()).context("stderr utf8")
    }

    pub fn assert_exit_code(&self, expected: ExitCode) -> Result<()> {
        let exit = self.exit_code.context("exit code recorded")?;
        ensure!(exit == expected, "expected exit {expected:?}, got {exit:?}");
        Ok(())
    }
}

/// Splits a command line on whitespace, keeping single-quoted text whole.
pub(super) fn build_args(command: &str) -> Vec<OsString> {
    let mut args = vec![OsString::from("dtm")];
    let mut current = String::new();
    let mut quoted = false;
    let mut in_token = false;
    for character in command.trim().chars() {
        match character {
            '\'' => {
                quoted = !quoted;
                in_token = true;
            }
            c if c.is_whitespace() && !quoted => {
                if in_token {
                    args.push(OsString::from(std::mem::take(&mut current)));
                    in_token = false;
                }
            }
            c => {
                current.push(c);
                in_token = true;
            }
        }
    }
    if in_token {
        args.push(OsString::from(current));
    }
    args
}

#[fixture]
pub(super) fn world() -> RefCell<TestWorld> {
    RefCell::new(TestWorld::default())
}
