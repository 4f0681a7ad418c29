//! Interactive hardware test sequence.
//!
//! The sequence is an ordered table of [`Step`]s. Each main button click
//! runs the end action of the current step, moves to the next one and runs
//! its begin action. The `begin` console command leaves `STARTUP` and
//! identifies the board; clicks before that are ignored.

use crate::commands::Command;
use crate::constants::*;
use crate::error::Result;
use crate::transport::{SerialLink, Transport};
use crate::types::IdentificationReport;
use chrono::Utc;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;

/// States of the test sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TestState {
    Startup,
    Init,
    TestLed1,
    TestLed2,
    TestLoadSw,
    TestCustomBatt,
    TestEnterCriticalSection,
    TestLeaveCriticalSection,
    TestSelfReset,
}

impl TestState {
    pub fn name(self) -> &'static str {
        match self {
            TestState::Startup => "STARTUP",
            TestState::Init => "INIT",
            TestState::TestLed1 => "TEST_LED_1",
            TestState::TestLed2 => "TEST_LED_2",
            TestState::TestLoadSw => "TEST_LOAD_SW",
            TestState::TestCustomBatt => "TEST_CUSTOM_BATT",
            TestState::TestEnterCriticalSection => "TEST_ENTER_CRITICAL_SECTION",
            TestState::TestLeaveCriticalSection => "TEST_LEAVE_CRITICAL_SECTION",
            TestState::TestSelfReset => "TEST_SELF_RESET",
        }
    }
}

impl fmt::Display for TestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Commands pushed to the peer when a step starts or ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Action {
    pub message: &'static str,
    pub sends: &'static [(Command, Option<i32>)],
}

/// One entry of the test sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub state: TestState,
    pub begin: Option<Action>,
    pub end: Option<Action>,
}

const fn step(state: TestState) -> Step {
    Step {
        state,
        begin: None,
        end: None,
    }
}

/// The test sequence, in execution order
pub const STEPS: [Step; 9] = [
    step(TestState::Startup),
    step(TestState::Init),
    step(TestState::TestLed1),
    step(TestState::TestLed2),
    Step {
        state: TestState::TestLoadSw,
        begin: Some(Action {
            message: "Enabling load switch.",
            sends: &[(Command::SetLoadSwitch, Some(1))],
        }),
        end: Some(Action {
            message: "Disabling load switch.",
            sends: &[(Command::SetLoadSwitch, Some(0))],
        }),
    },
    // The three thresholds are not acknowledged; a partial update goes unnoticed.
    Step {
        state: TestState::TestCustomBatt,
        begin: Some(Action {
            message: "Setting new battery characteristics.",
            sends: &[
                (Command::SetBatteryVoltageLow, Some(CUSTOM_BATTERY_VOLTAGE_LOW_MV)),
                (Command::SetBatteryVoltage3, Some(CUSTOM_BATTERY_VOLTAGE_3_MV)),
                (Command::SetBatteryVoltage6, Some(CUSTOM_BATTERY_VOLTAGE_6_MV)),
            ],
        }),
        end: None,
    },
    Step {
        state: TestState::TestEnterCriticalSection,
        begin: Some(Action {
            message: "Entering critical section for 8s.",
            sends: &[(
                Command::EnterCriticalSection,
                Some(CRITICAL_SECTION_DURATION_MS),
            )],
        }),
        end: None,
    },
    Step {
        state: TestState::TestLeaveCriticalSection,
        begin: Some(Action {
            message: "Leaving critical section.",
            sends: &[(Command::LeaveCriticalSection, None)],
        }),
        end: None,
    },
    Step {
        state: TestState::TestSelfReset,
        begin: Some(Action {
            message: "Self reset.",
            sends: &[(Command::RequestReset, None)],
        }),
        end: None,
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    Step(usize),
    /// Past the last step; the peer is expected to have restarted
    Finished,
}

/// Owner of the current test state
#[derive(Debug, Clone)]
pub struct Sequencer {
    position: Position,
    visited: Vec<TestState>,
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl Sequencer {
    /// Sequencer in `STARTUP`
    pub fn new() -> Self {
        Sequencer {
            position: Position::Step(0),
            visited: vec![STEPS[0].state],
        }
    }

    /// Current state, `None` once the sequence has finished
    pub fn current(&self) -> Option<TestState> {
        match self.position {
            Position::Step(index) => Some(STEPS[index].state),
            Position::Finished => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.position == Position::Finished
    }

    /// States entered so far, in order
    pub fn visited(&self) -> &[TestState] {
        &self.visited
    }

    /// Leave `STARTUP` and run the identification queries.
    ///
    /// Returns `None` without touching the peer when the sequence has
    /// already begun.
    pub fn begin<S: SerialLink>(
        &mut self,
        transport: &mut Transport<S>,
    ) -> Option<IdentificationReport> {
        if self.current() != Some(TestState::Startup) {
            warn!("Test sequence already started, ignoring begin.");
            return None;
        }
        info!("Beginning energy API test sequence.");
        self.enter(1);

        let hw_revision = logged("Hardware revision", transport.hw_revision());
        let board_id = logged("Board ID", transport.board_id());
        let api_version = match transport.check_api_version() {
            Ok(check) => {
                info!("Energy controller API version : {}", check.peer);
                info!("Local API version : {}", check.host);
                Some(check)
            }
            Err(e) => {
                warn!("API version query failed: {}", e);
                None
            }
        };
        let fw_version = logged("Energy controller firmware version", transport.fw_version());
        let battery_type = match transport.battery_type() {
            Ok(battery) => {
                info!("Battery type : {}", battery.description());
                Some(battery)
            }
            Err(e) => {
                warn!("Battery type query failed: {}", e);
                None
            }
        };

        Some(IdentificationReport {
            timestamp: Utc::now(),
            hw_revision,
            board_id,
            api_version,
            fw_version,
            battery_type,
        })
    }

    /// Handle a main button click. Returns the state entered, if any.
    pub fn advance<S: SerialLink>(&mut self, transport: &mut Transport<S>) -> Option<TestState> {
        let index = match self.position {
            Position::Step(0) => {
                debug!("Click ignored, waiting for begin.");
                return None;
            }
            Position::Step(index) => index,
            Position::Finished => {
                debug!("Click ignored, test sequence finished.");
                return None;
            }
        };

        if let Some(action) = STEPS[index].end {
            run_action(transport, &action);
        }

        if index + 1 < STEPS.len() {
            self.enter(index + 1);
            let step = STEPS[index + 1];
            info!("Entering {}.", step.state);
            if let Some(action) = step.begin {
                run_action(transport, &action);
            }
            Some(step.state)
        } else {
            self.position = Position::Finished;
            info!("Test sequence finished.");
            None
        }
    }

    fn enter(&mut self, index: usize) {
        self.position = Position::Step(index);
        self.visited.push(STEPS[index].state);
    }
}

fn run_action<S: SerialLink>(transport: &mut Transport<S>, action: &Action) {
    info!("{}", action.message);
    for &(command, argument) in action.sends {
        if let Err(e) = transport.send_command(command, argument) {
            warn!("{} failed: {}", command, e);
        }
    }
}

fn logged(label: &str, result: Result<i32>) -> Option<i32> {
    match result {
        Ok(value) => {
            info!("{} : {}", label, value);
            Some(value)
        }
        Err(e) => {
            warn!("{} query failed: {}", label, e);
            None
        }
    }
}
