//! MB-008: Recipe interpreter, the run-level state machine.
//!
//! Running: take the next command. Instantaneous commands mutate the store
//! and stay Running; Wait records `waitStartTime` and moves to Waiting.
//! Waiting: evaluate the condition; if true resume Running, otherwise
//! advance the clock one simulated second, ramp every channel and append a
//! snapshot. Reaching the time bound aborts the whole run.
//!
//! One store per run, owned by the interpreter. Errors stop the run at
//! once; the history collected so far stays readable on the interpreter.

use super::config::SimConfig;
use super::error::Result;
use super::expr;
use super::ramp;
use super::resolver;
use super::store::{VariableStore, SHUTTER_PREFIX, TIME_KEY, WAIT_START_KEY};
use super::types::*;
use std::rc::Rc;
use tracing::{debug, info, trace, warn};

/// Simulated seconds per recorded step.
pub const TIME_STEP: f64 = 1.0;

/// Drives one run of a parsed recipe.
pub struct Interpreter<'a> {
    program: &'a [ParsedLine],
    cursor: usize,
    store: VariableStore,
    history: History,
    state: RunState,
    max_seconds: f64,
}

impl<'a> Interpreter<'a> {
    pub fn new(program: &'a [ParsedLine], config: &SimConfig) -> Self {
        Self {
            program,
            cursor: 0,
            store: config.initial_store(),
            history: History::new(),
            state: RunState::Running,
            max_seconds: config.simulation.max_seconds,
        }
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn store(&self) -> &VariableStore {
        &self.store
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Terminal status, or None while the run is still going.
    pub fn status(&self) -> Option<RunStatus> {
        match self.state {
            RunState::Completed => Some(RunStatus::Completed),
            RunState::Aborted(reason) => Some(RunStatus::Aborted(reason)),
            RunState::Running | RunState::Waiting { .. } => None,
        }
    }

    /// Perform one state transition. No-op once the run has halted.
    pub fn step(&mut self) -> Result<()> {
        match &self.state {
            RunState::Running => {
                let program = self.program;
                let Some(parsed) = program.get(self.cursor) else {
                    self.state = RunState::Completed;
                    return Ok(());
                };
                self.cursor += 1;
                debug!(
                    line = parsed.line,
                    command = parsed.command.keyword(),
                    "dispatch"
                );
                self.dispatch(&parsed.command)
            }
            RunState::Waiting { condition } => {
                let condition = Rc::clone(condition);
                self.tick(&condition)
            }
            RunState::Aborted(_) | RunState::Completed => Ok(()),
        }
    }

    /// Step until the run halts.
    pub fn run(&mut self) -> Result<RunStatus> {
        info!(commands = self.program.len(), "run started");
        loop {
            if let Some(status) = self.status() {
                info!(%status, steps = self.history.len(), "run finished");
                return Ok(status);
            }
            self.step()?;
        }
    }

    /// Hand back everything collected, once the run has halted. None while
    /// it is still going, including after `run` or `step` returned an error.
    pub fn into_outcome(self) -> Option<RunOutcome> {
        let status = self.status()?;
        Some(self.finish(status))
    }

    fn finish(self, status: RunStatus) -> RunOutcome {
        RunOutcome {
            status,
            final_store: self.store.snapshot(),
            history: self.history,
        }
    }

    fn dispatch(&mut self, command: &Command) -> Result<()> {
        match command {
            Command::Define { name, value } => {
                self.store.set(name.clone(), *value);
            }
            Command::Set { name, value } => {
                let resolved = match value {
                    SetValue::Literal(v) => *v,
                    SetValue::Reference(var) => self.store.get(var)?,
                };
                self.store.set(name.clone(), resolved);
            }
            Command::Shutter { names, open } => {
                for name in names {
                    self.store.set(format!("{SHUTTER_PREFIX}{name}"), *open);
                }
            }
            Command::Calculate { name, expr } => {
                let literal = resolver::substitute(expr, &self.store)?;
                let value = expr::evaluate_arithmetic(&literal)?;
                self.store.set(name.clone(), value);
            }
            Command::Wait { condition } => {
                let now = self.store.time()?;
                self.store.set(WAIT_START_KEY, now);
                debug!(%condition, start = now, "wait begins");
                self.state = RunState::Waiting {
                    condition: Rc::from(condition.as_str()),
                };
            }
            Command::Include { path } => {
                debug!(%path, "include has no effect");
            }
        }
        Ok(())
    }

    /// One iteration of a wait block.
    fn tick(&mut self, condition: &str) -> Result<()> {
        let literal = resolver::substitute(condition, &self.store)?;
        if expr::evaluate_boolean(&literal)? {
            debug!(time = self.store.time()?, "wait satisfied");
            self.state = RunState::Running;
            return Ok(());
        }

        let time = self.store.time()? + TIME_STEP;
        self.store.set(TIME_KEY, time);
        ramp::advance_all(&mut self.store, TIME_STEP)?;
        self.history.push(self.store.snapshot());
        trace!(time, %literal, "step");

        if time >= self.max_seconds {
            warn!(
                time,
                %condition,
                "wait never satisfied, aborting at the simulated time bound"
            );
            self.state = RunState::Aborted(AbortReason::InfiniteLoop);
        }
        Ok(())
    }
}

/// Run a parsed recipe from a fresh store to completion or abort.
pub fn simulate(program: &[ParsedLine], config: &SimConfig) -> Result<RunOutcome> {
    let mut interpreter = Interpreter::new(program, config);
    let status = interpreter.run()?;
    Ok(interpreter.finish(status))
}
