//! In-memory fakes for the process runner (testing only).

use std::sync::Mutex;

use async_trait::async_trait;

use crate::runner::{Invocation, ProcessRunner, RunOutcome};

/// A [`ProcessRunner`] that returns canned outcomes keyed by argument vector
/// and records every invocation it receives.
///
/// Invocations without a scripted outcome come back as launch failures.
#[derive(Debug, Default)]
pub struct ScriptedProcessRunner {
    outcomes: Vec<(Vec<String>, RunOutcome)>,
    calls: Mutex<Vec<Invocation>>,
}

impl ScriptedProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `outcome` whenever the argument vector equals `arguments`.
    pub fn on<I, S>(mut self, arguments: I, outcome: RunOutcome) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let arguments = arguments.into_iter().map(Into::into).collect();
        self.outcomes.push((arguments, outcome));
        self
    }

    /// Every invocation received so far, in call order.
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessRunner for ScriptedProcessRunner {
    async fn run(&self, invocation: &Invocation) -> RunOutcome {
        self.calls.lock().unwrap().push(invocation.clone());
        self.outcomes
            .iter()
            .find(|(arguments, _)| *arguments == invocation.arguments)
            .map(|(_, outcome)| outcome.clone())
            .unwrap_or_else(|| {
                RunOutcome::launch_failed(format!(
                    "no scripted outcome for {}",
                    invocation.command_line()
                ))
            })
    }
}
