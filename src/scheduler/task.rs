//! Task identity, lifecycle state, and fairness accounting.

use crate::machine::errors::Fault;
use crate::machine::program::Program;
use crate::machine::state::MachineState;
use crate::scheduler::syscall::DiskRequest;

/// Identifies a task for the lifetime of a scheduler.
pub type TaskId = u32;

/// Fixed-point scale for virtual runtime: a task is charged
/// `ticks * VRUNTIME_SCALE / weight` per quantum, so higher weights grow
/// vruntime slower and get picked more often.
pub const VRUNTIME_SCALE: u64 = 1 << 10;

/// Why a waiting task is parked.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum WaitReason {
    /// Asleep until the clock reaches `wake_tick`.
    Timer { wake_tick: u64 },
    /// Queued on a mutex held by another task.
    Mutex { id: i64 },
    /// Blocked on an in-flight disk transfer.
    Disk(DiskRequest),
}

/// Lifecycle of a task on the single virtual CPU.
///
/// `Ready ⇄ Running`, `Running → Waiting → Ready` on wake, and the two
/// terminal states. At most one task is `Running` at any instant.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TaskState {
    /// Runnable, queued by virtual runtime.
    Ready,
    /// Currently executing its quantum.
    Running,
    /// Parked until the wait reason resolves.
    Waiting(WaitReason),
    /// Program counter ran past the end of the program.
    Terminated,
    /// Tripped a fault and was removed from scheduling.
    Faulted(Fault),
}

impl TaskState {
    /// True for `Terminated` and `Faulted`: the task will never run again.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Terminated | TaskState::Faulted(_))
    }
}

/// One schedulable program with its private machine state.
#[derive(Clone, Debug)]
pub struct Task {
    pub(super) id: TaskId,
    pub(super) name: String,
    pub(super) program: Program,
    pub(super) pc: usize,
    pub(super) machine: MachineState,
    pub(super) weight: u32,
    pub(super) vruntime: u64,
    pub(super) ticks_run: u64,
    pub(super) state: TaskState,
}

impl Task {
    pub(super) fn new(id: TaskId, name: String, program: Program, weight: u32) -> Self {
        Self {
            id,
            name,
            program,
            pc: 0,
            machine: MachineState::new(),
            // A weight of zero would never accumulate vruntime.
            weight: weight.max(1),
            vruntime: 0,
            ticks_run: 0,
            state: TaskState::Ready,
        }
    }

    /// The task's scheduler-assigned id.
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// The task's diagnostic name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state.
    pub const fn state(&self) -> &TaskState {
        &self.state
    }

    /// Current program counter.
    pub const fn pc(&self) -> usize {
        self.pc
    }

    /// Scheduling weight (share of the CPU relative to other tasks).
    pub const fn weight(&self) -> u32 {
        self.weight
    }

    /// Accumulated virtual runtime, in `VRUNTIME_SCALE` units per
    /// weight-normalized tick. Monotonically non-decreasing.
    pub const fn vruntime(&self) -> u64 {
        self.vruntime
    }

    /// Total instruction ticks this task has executed.
    pub const fn ticks_run(&self) -> u64 {
        self.ticks_run
    }

    /// Snapshot of the task's registers, memory, and flags.
    pub const fn machine(&self) -> &MachineState {
        &self.machine
    }

    /// Records executed ticks without touching fairness standing.
    pub(super) fn record_ticks(&mut self, ticks: u32) {
        self.ticks_run += u64::from(ticks);
    }

    /// Charges executed ticks against the task's virtual runtime.
    pub(super) fn charge_vruntime(&mut self, ticks: u32) {
        self.vruntime += u64::from(ticks) * VRUNTIME_SCALE / u64::from(self.weight);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(weight: u32) -> Task {
        Task::new(0, "t".into(), Program::new(Vec::new()), weight)
    }

    #[test]
    fn weight_is_clamped_to_at_least_one() {
        assert_eq!(task(0).weight(), 1);
        assert_eq!(task(3).weight(), 3);
    }

    #[test]
    fn vruntime_grows_slower_for_heavier_tasks() {
        let mut light = task(1);
        let mut heavy = task(4);
        light.charge_vruntime(8);
        heavy.charge_vruntime(8);
        assert_eq!(light.vruntime(), 8 * VRUNTIME_SCALE);
        assert_eq!(heavy.vruntime(), 2 * VRUNTIME_SCALE);
    }

    #[test]
    fn tick_accounting_is_separate_from_vruntime() {
        let mut t = task(2);
        t.record_ticks(5);
        assert_eq!(t.ticks_run(), 5);
        assert_eq!(t.vruntime(), 0);
    }

    #[test]
    fn terminal_states() {
        assert!(TaskState::Terminated.is_terminal());
        assert!(TaskState::Faulted(crate::machine::errors::Fault::InvalidWrite).is_terminal());
        assert!(!TaskState::Ready.is_terminal());
        assert!(!TaskState::Waiting(WaitReason::Timer { wake_tick: 3 }).is_terminal());
    }
}
