//! The outer restart loop: launch the worker, wait for it to exit, restart
//! on any non-zero exit, bounded or unbounded.
//!
//! The supervisor knows nothing about why the worker exited beyond its exit
//! code, and never touches the checkpoint log; resume is entirely the
//! worker's business. Modeled as an explicit state machine rather than a
//! loop with mutable counters.

use std::{
    path::PathBuf,
    process::{Command, Stdio},
    time::Duration,
};

use tracing::{error, info, warn};

use crate::error::{PaperpanError, PaperpanResult};

/// A launched worker that can be waited on. `wait` blocks until the process
/// exits and returns its exit code; a signal-killed process reports -1.
pub trait WorkerProcess {
    fn wait(&mut self) -> PaperpanResult<i32>;
}

/// Launches one worker attempt. Failing to launch at all is reported as a
/// `Launch` error and counts against the retry budget like a crash.
pub trait Launcher {
    type Process: WorkerProcess;

    fn launch(&mut self) -> PaperpanResult<Self::Process>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SupervisorState {
    Launching,
    Running,
    Crashed,
    Succeeded,
    GaveUp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SupervisorOutcome {
    /// The worker exited 0.
    Succeeded { attempts: u32 },
    /// The retry budget ran out before a clean exit.
    GaveUp { attempts: u32 },
}

#[derive(Clone, Copy, Debug)]
pub struct SupervisorPolicy {
    /// Delay between a crash and the next launch.
    pub restart_delay: Duration,
    /// Maximum number of launch attempts; `None` retries forever.
    pub max_retries: Option<u32>,
}

/// Run the supervision state machine to a terminal state.
pub fn supervise<L: Launcher>(launcher: &mut L, policy: SupervisorPolicy) -> SupervisorOutcome {
    let mut state = SupervisorState::Launching;
    let mut attempts: u32 = 0;
    let mut running: Option<L::Process> = None;

    loop {
        match state {
            SupervisorState::Launching => {
                attempts += 1;
                info!(attempt = attempts, "starting worker");
                state = match launcher.launch() {
                    Ok(process) => {
                        running = Some(process);
                        SupervisorState::Running
                    }
                    Err(e) => {
                        error!(attempt = attempts, error = %e, "could not start worker");
                        SupervisorState::Crashed
                    }
                };
            }
            SupervisorState::Running => {
                state = match running.take() {
                    Some(mut process) => match process.wait() {
                        Ok(0) => SupervisorState::Succeeded,
                        Ok(code) => {
                            warn!(attempt = attempts, code, "worker crashed");
                            SupervisorState::Crashed
                        }
                        Err(e) => {
                            warn!(attempt = attempts, error = %e, "lost track of worker");
                            SupervisorState::Crashed
                        }
                    },
                    // Running is only ever entered from a successful launch.
                    None => SupervisorState::Crashed,
                };
            }
            SupervisorState::Crashed => {
                if let Some(max) = policy.max_retries
                    && attempts >= max
                {
                    state = SupervisorState::GaveUp;
                    continue;
                }
                info!(delay_secs = policy.restart_delay.as_secs(), "restarting worker");
                std::thread::sleep(policy.restart_delay);
                state = SupervisorState::Launching;
            }
            SupervisorState::Succeeded => {
                info!(attempts, "worker completed successfully");
                return SupervisorOutcome::Succeeded { attempts };
            }
            SupervisorState::GaveUp => {
                error!(attempts, "max retries reached, giving up");
                return SupervisorOutcome::GaveUp { attempts };
            }
        }
    }
}

impl WorkerProcess for std::process::Child {
    fn wait(&mut self) -> PaperpanResult<i32> {
        let status = std::process::Child::wait(self)
            .map_err(|e| PaperpanError::launch(format!("wait for worker: {e}")))?;
        Ok(status.code().unwrap_or(-1))
    }
}

/// Launches a fresh worker process: the given program run with the given
/// arguments, inheriting stdio so worker logs land on the same console.
#[derive(Clone, Debug)]
pub struct CommandLauncher {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl CommandLauncher {
    /// Re-launch the current executable with `args` (the `worker`
    /// subcommand and its flags).
    pub fn current_exe(args: Vec<String>) -> PaperpanResult<Self> {
        let program = std::env::current_exe()
            .map_err(|e| PaperpanError::launch(format!("resolve current executable: {e}")))?;
        Ok(Self { program, args })
    }
}

impl Launcher for CommandLauncher {
    type Process = std::process::Child;

    fn launch(&mut self) -> PaperpanResult<Self::Process> {
        Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|e| {
                PaperpanError::launch(format!(
                    "spawn worker '{}': {e}",
                    self.program.display()
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ScriptedProcess {
        code: i32,
    }

    impl WorkerProcess for ScriptedProcess {
        fn wait(&mut self) -> PaperpanResult<i32> {
            Ok(self.code)
        }
    }

    /// Launcher driven by a script of attempt outcomes.
    struct ScriptedLauncher {
        script: Vec<Result<i32, ()>>,
        attempts: u32,
    }

    impl ScriptedLauncher {
        fn new(script: Vec<Result<i32, ()>>) -> Self {
            Self {
                script,
                attempts: 0,
            }
        }
    }

    impl Launcher for ScriptedLauncher {
        type Process = ScriptedProcess;

        fn launch(&mut self) -> PaperpanResult<Self::Process> {
            let step = self.script.get(self.attempts as usize).copied();
            self.attempts += 1;
            match step {
                Some(Ok(code)) => Ok(ScriptedProcess { code }),
                Some(Err(())) | None => Err(PaperpanError::launch("scripted launch failure")),
            }
        }
    }

    fn policy(max_retries: Option<u32>) -> SupervisorPolicy {
        SupervisorPolicy {
            restart_delay: Duration::from_millis(0),
            max_retries,
        }
    }

    #[test]
    fn clean_exit_succeeds_on_first_attempt() {
        let mut launcher = ScriptedLauncher::new(vec![Ok(0)]);
        let outcome = supervise(&mut launcher, policy(Some(3)));
        assert_eq!(outcome, SupervisorOutcome::Succeeded { attempts: 1 });
    }

    #[test]
    fn crash_then_success_restarts_once() {
        let mut launcher = ScriptedLauncher::new(vec![Ok(1), Ok(0)]);
        let outcome = supervise(&mut launcher, policy(Some(5)));
        assert_eq!(outcome, SupervisorOutcome::Succeeded { attempts: 2 });
    }

    #[test]
    fn always_failing_launch_stops_at_max_retries() {
        let mut launcher = ScriptedLauncher::new(vec![Err(()), Err(()), Err(())]);
        let outcome = supervise(&mut launcher, policy(Some(3)));
        assert_eq!(outcome, SupervisorOutcome::GaveUp { attempts: 3 });
        assert_eq!(launcher.attempts, 3);
    }

    #[test]
    fn launch_failure_counts_like_a_crash() {
        let mut launcher = ScriptedLauncher::new(vec![Err(()), Ok(0)]);
        let outcome = supervise(&mut launcher, policy(Some(3)));
        assert_eq!(outcome, SupervisorOutcome::Succeeded { attempts: 2 });
    }

    #[test]
    fn unbounded_policy_keeps_retrying_past_any_fixed_budget() {
        let mut script: Vec<Result<i32, ()>> = vec![Ok(2); 7];
        script.push(Ok(0));
        let mut launcher = ScriptedLauncher::new(script);
        let outcome = supervise(&mut launcher, policy(None));
        assert_eq!(outcome, SupervisorOutcome::Succeeded { attempts: 8 });
    }
}
