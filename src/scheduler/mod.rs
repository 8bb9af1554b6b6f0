//! Fair-share scheduler for the virtual CPU.
//!
//! Owns the set of tasks, the global tick clock, and the shared resources
//! the syscall layer mediates (mutex table, simulated disk). Each scheduling
//! round pops the ready task with the lowest virtual runtime, drives the
//! execution engine for one quantum, applies syscall directives, and puts
//! the task back where its new state says it belongs.
//!
//! # Architecture
//!
//! - **Ready queue**: ordered by `(vruntime, id)`, so the minimum virtual
//!   runtime runs next and ties resolve deterministically by id
//! - **Clock**: one global tick, advanced once per executed instruction;
//!   when nothing is runnable the clock jumps to the earliest timed wakeup
//! - **Waiting tasks**: parked by reason — timer and disk deadlines in
//!   ordered sets, mutex waiters in per-mutex FIFO queues
//! - **Fault isolation**: a fault removes the offending task only; the
//!   simulation keeps running everything else
//! - **Determinism**: identical programs, weights, and quantum produce an
//!   identical interleaving, tick for tick
//!
//! # Modules
//!
//! - [`syscall`]: syscall dispatch, mutex table, and the simulated disk
//! - [`task`]: task identity, lifecycle state, and fairness accounting

pub mod syscall;
pub mod task;

use crate::machine::engine::{self, StepOutcome};
use crate::machine::errors::Fault;
use crate::machine::program::Program;
use crate::scheduler::syscall::{Disk, DiskConfig, MutexTable, SyscallEffect};
use crate::scheduler::task::{Task, TaskId, TaskState, WaitReason};
use crate::{info, warn};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Default instruction steps per scheduling round.
pub const DEFAULT_QUANTUM: u32 = 8;

/// Scheduler tuning knobs.
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Maximum instruction steps a task executes before the scheduler
    /// reconsiders. Clamped to at least 1.
    pub quantum: u32,
    /// Simulated disk geometry and timing.
    pub disk: DiskConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            quantum: DEFAULT_QUANTUM,
            disk: DiskConfig::default(),
        }
    }
}

/// Process-fatal scheduler errors.
///
/// These indicate a bug in the scheduler itself, never in a task; they abort
/// the run and are surfaced to the caller verbatim.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SchedulerError {
    /// Internal bookkeeping disagrees with itself, e.g. a mutex wait queue
    /// naming a task the scheduler does not know.
    #[error("scheduler invariant violated: {0}")]
    InvariantViolation(String),
}

/// Final outcome of a run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SchedulerReport {
    /// Every task's state when the run stopped.
    pub final_states: BTreeMap<TaskId, TaskState>,
    /// Clock value when the run stopped.
    pub final_tick: u64,
}

/// How one scheduling round ended for the running task.
enum RoundEnd {
    /// Quantum exhausted; the task goes back to the ready queue.
    Preempted,
    /// Program counter reached the end of the program.
    Terminated,
    /// A syscall parked the task.
    Blocked(WaitReason),
    /// The task faulted and is done for good.
    Faulted(Fault),
}

/// The multitasking executive: tasks, clock, and shared resources.
pub struct Scheduler {
    config: SchedulerConfig,
    tasks: Vec<Task>,
    /// Runnable tasks, minimum `(vruntime, id)` first.
    ready: BTreeSet<(u64, TaskId)>,
    /// Timer wakeups as `(wake_tick, id)`.
    timers: BTreeSet<(u64, TaskId)>,
    /// Disk completions as `(ready_tick, id)`.
    disk_waits: BTreeSet<(u64, TaskId)>,
    mutexes: MutexTable,
    disk: Disk,
    tick: u64,
}

impl Scheduler {
    /// Creates an empty scheduler with the given configuration.
    pub fn new(config: SchedulerConfig) -> Self {
        let disk = Disk::new(config.disk.clone());
        Self {
            config: SchedulerConfig {
                quantum: config.quantum.max(1),
                ..config
            },
            tasks: Vec::new(),
            ready: BTreeSet::new(),
            timers: BTreeSet::new(),
            disk_waits: BTreeSet::new(),
            mutexes: MutexTable::new(),
            disk,
            tick: 0,
        }
    }

    /// Adds a task with a fresh machine state and marks it ready.
    ///
    /// Higher `weight` means a larger share of the CPU; zero is treated
    /// as one.
    pub fn spawn(&mut self, name: impl Into<String>, program: Program, weight: u32) -> TaskId {
        let id = self.tasks.len() as TaskId;
        let task = Task::new(id, name.into(), program, weight);
        info!(
            "spawned task {} '{}' (weight {}, {} instructions)",
            id,
            task.name(),
            task.weight(),
            task.program.len()
        );
        self.ready.insert((task.vruntime, id));
        self.tasks.push(task);
        id
    }

    /// Runs scheduling rounds until every task is terminal, the system
    /// deadlocks, or the tick budget is exhausted (checked at round
    /// boundaries only).
    pub fn run_to_completion(
        &mut self,
        max_ticks: Option<u64>,
    ) -> Result<SchedulerReport, SchedulerError> {
        loop {
            if let Some(max) = max_ticks {
                if self.tick >= max {
                    info!("tick budget {} exhausted", max);
                    break;
                }
            }
            if !self.run_round()? {
                break;
            }
        }
        Ok(self.report())
    }

    /// Executes one scheduling round: picks the minimum-vruntime ready task
    /// and drives it for up to one quantum.
    ///
    /// With nothing ready, jumps the clock to the earliest timed wakeup
    /// instead. Returns `false` once no task can ever run again.
    pub fn run_round(&mut self) -> Result<bool, SchedulerError> {
        let Some(&(_, id)) = self.ready.first() else {
            return self.advance_idle();
        };
        self.ready.pop_first();
        self.task_mut(id)?.state = TaskState::Running;

        let quantum = self.config.quantum;
        let mut consumed: u32 = 0;
        // Mutex grants released by the running task, applied at the round
        // boundary.
        let mut granted: Vec<TaskId> = Vec::new();

        let end = loop {
            if consumed >= quantum {
                break RoundEnd::Preempted;
            }
            let Self {
                tasks,
                mutexes,
                disk,
                tick,
                ..
            } = self;
            let task = tasks
                .get_mut(id as usize)
                .ok_or_else(|| unknown_task(id))?;
            let len = task.program.len();
            let pc = task.pc;
            if pc >= len {
                break RoundEnd::Terminated;
            }
            *tick += 1;
            consumed += 1;

            let outcome = {
                let Task {
                    program, machine, ..
                } = task;
                let instr = program
                    .get(pc)
                    .ok_or_else(|| invariant(format!("task {id} pc {pc} out of program")))?;
                engine::step(instr, machine, pc, len)
            };
            match outcome {
                Ok(StepOutcome::Advance) => {
                    task.pc = pc + 1;
                    if task.pc == len {
                        break RoundEnd::Terminated;
                    }
                }
                Ok(StepOutcome::Jump(target)) => {
                    task.pc = target;
                    if target == len {
                        break RoundEnd::Terminated;
                    }
                }
                Ok(StepOutcome::Syscall(number)) => {
                    match syscall::dispatch(number, id, &task.machine, *tick, mutexes, disk) {
                        Ok(SyscallEffect::Continue) => {
                            task.pc = pc + 1;
                            if task.pc == len {
                                break RoundEnd::Terminated;
                            }
                        }
                        Ok(SyscallEffect::ContinueAndWake(next)) => {
                            granted.push(next);
                            task.pc = pc + 1;
                            if task.pc == len {
                                break RoundEnd::Terminated;
                            }
                        }
                        Ok(SyscallEffect::Block(reason)) => {
                            // Resume past the syscall on wake; a granted
                            // mutex must not be re-raced.
                            task.pc = pc + 1;
                            break RoundEnd::Blocked(reason);
                        }
                        Err(fault) => break RoundEnd::Faulted(fault),
                    }
                }
                Err(fault) => break RoundEnd::Faulted(fault),
            }
        };

        self.task_mut(id)?.record_ticks(consumed);
        match end {
            RoundEnd::Preempted => {
                let task = self.task_mut(id)?;
                task.charge_vruntime(consumed);
                task.state = TaskState::Ready;
                let key = (task.vruntime, id);
                self.ready.insert(key);
            }
            RoundEnd::Terminated => {
                self.task_mut(id)?.state = TaskState::Terminated;
                info!("task {} terminated at tick {}", id, self.tick);
            }
            RoundEnd::Faulted(fault) => {
                warn!("task {} faulted at tick {}: {}", id, self.tick, fault);
                self.task_mut(id)?.state = TaskState::Faulted(fault);
            }
            RoundEnd::Blocked(reason) => {
                match &reason {
                    WaitReason::Timer { wake_tick } => {
                        self.timers.insert((*wake_tick, id));
                    }
                    WaitReason::Disk(request) => {
                        self.disk_waits.insert((request.ready_tick, id));
                    }
                    WaitReason::Mutex { .. } => {}
                }
                self.task_mut(id)?.state = TaskState::Waiting(reason);
            }
        }

        for next in granted {
            self.grant_wake(next)?;
        }
        self.wake_sleepers()?;
        Ok(true)
    }

    /// Force-terminates a task between rounds.
    ///
    /// The task is pulled out of every queue; mutexes it held pass to their
    /// FIFO heads. A no-op for already-terminal tasks.
    pub fn kill(&mut self, id: TaskId) -> Result<(), SchedulerError> {
        let task = self.task_mut(id)?;
        if task.state.is_terminal() {
            return Ok(());
        }
        let key = (task.vruntime, id);
        task.state = TaskState::Terminated;
        self.ready.remove(&key);
        self.timers.retain(|&(_, t)| t != id);
        self.disk_waits.retain(|&(_, t)| t != id);
        let granted = self.mutexes.purge(id);
        info!("killed task {} at tick {}", id, self.tick);
        for next in granted {
            self.grant_wake(next)?;
        }
        Ok(())
    }

    /// Snapshot of every task's state and the clock.
    pub fn report(&self) -> SchedulerReport {
        SchedulerReport {
            final_states: self
                .tasks
                .iter()
                .map(|task| (task.id, task.state.clone()))
                .collect(),
            final_tick: self.tick,
        }
    }

    /// The global clock, in executed instruction ticks.
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Looks up a task for diagnostics.
    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(id as usize)
    }

    /// Iterates over all tasks in id order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    /// Current holder of a mutex, if any.
    pub fn mutex_holder(&self, id: i64) -> Option<TaskId> {
        self.mutexes.holder(id)
    }

    /// Number of tasks queued on a mutex.
    pub fn mutex_waiters(&self, id: i64) -> usize {
        self.mutexes.waiters(id)
    }

    /// The simulated disk.
    pub fn disk(&self) -> &Disk {
        &self.disk
    }

    /// Mutable disk access, e.g. to seed blocks before a run.
    pub fn disk_mut(&mut self) -> &mut Disk {
        &mut self.disk
    }

    /// Handles an empty ready queue: jumps the clock to the earliest timed
    /// wakeup, or reports that nothing can ever run again.
    fn advance_idle(&mut self) -> Result<bool, SchedulerError> {
        let next_timer = self.timers.first().map(|&(when, _)| when);
        let next_disk = self.disk_waits.first().map(|&(when, _)| when);
        let next = match (next_timer, next_disk) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        match next {
            Some(when) => {
                if when > self.tick {
                    self.tick = when;
                }
                self.wake_sleepers()?;
                Ok(true)
            }
            None => {
                let stuck: Vec<TaskId> = self
                    .tasks
                    .iter()
                    .filter(|task| matches!(task.state, TaskState::Waiting(_)))
                    .map(|task| task.id)
                    .collect();
                if !stuck.is_empty() {
                    warn!(
                        "deadlock at tick {}: tasks {:?} wait on mutexes nobody can release",
                        self.tick, stuck
                    );
                }
                Ok(false)
            }
        }
    }

    /// Moves every timer and disk waiter whose deadline has passed back to
    /// the ready queue; disk completions perform their transfer first.
    fn wake_sleepers(&mut self) -> Result<(), SchedulerError> {
        while let Some(&(when, id)) = self.timers.first() {
            if when > self.tick {
                break;
            }
            self.timers.pop_first();
            self.make_ready(id)?;
        }
        while let Some(&(when, id)) = self.disk_waits.first() {
            if when > self.tick {
                break;
            }
            self.disk_waits.pop_first();
            let Self { tasks, disk, .. } = self;
            let task = tasks
                .get_mut(id as usize)
                .ok_or_else(|| unknown_task(id))?;
            let request = match &task.state {
                TaskState::Waiting(WaitReason::Disk(request)) => request.clone(),
                other => {
                    return Err(invariant(format!(
                        "disk completion for task {id} in state {other:?}"
                    )));
                }
            };
            disk.complete(&request, task.machine.memory_mut());
            self.make_ready(id)?;
        }
        Ok(())
    }

    /// Wakes the task a released mutex was handed to.
    fn grant_wake(&mut self, id: TaskId) -> Result<(), SchedulerError> {
        let task = self
            .tasks
            .get_mut(id as usize)
            .ok_or_else(|| invariant(format!("mutex queue references unknown task {id}")))?;
        if !matches!(task.state, TaskState::Waiting(WaitReason::Mutex { .. })) {
            return Err(invariant(format!(
                "mutex granted to task {id} in state {:?}",
                task.state
            )));
        }
        task.state = TaskState::Ready;
        let key = (task.vruntime, id);
        self.ready.insert(key);
        Ok(())
    }

    /// Returns a woken task to the ready queue with its vruntime untouched,
    /// so it keeps its fairness standing.
    fn make_ready(&mut self, id: TaskId) -> Result<(), SchedulerError> {
        let task = self.tasks.get_mut(id as usize).ok_or_else(|| unknown_task(id))?;
        task.state = TaskState::Ready;
        let key = (task.vruntime, id);
        self.ready.insert(key);
        Ok(())
    }

    fn task_mut(&mut self, id: TaskId) -> Result<&mut Task, SchedulerError> {
        self.tasks.get_mut(id as usize).ok_or_else(|| unknown_task(id))
    }
}

fn invariant(message: String) -> SchedulerError {
    SchedulerError::InvariantViolation(message)
}

fn unknown_task(id: TaskId) -> SchedulerError {
    invariant(format!("unknown task id {id}"))
}
