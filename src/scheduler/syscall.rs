//! Syscall subsystem: timer sleeps, simulated disk I/O, and mutexes.
//!
//! A `SYSCALL` instruction reaches this module as a number plus the calling
//! task's registers; [`dispatch`] turns it into a [`SyscallEffect`] the
//! scheduler applies to the task's state machine. All shared resources here
//! (the mutex table, the disk) are mutated strictly between two instruction
//! steps, under the simulation's single-threaded discipline, so no locking
//! is needed.
//!
//! # Register convention
//!
//! The syscall argument is in `r1`; disk transfers take the memory address
//! in `r2`.
//!
//! | number | operation | `r1` | `r2` |
//! |--------|---------------------|-------------------|-----------------|
//! | 0 | alarm (sleep) | tick delta | — |
//! | 1 | disk read | block number | dest address |
//! | 2 | disk write | block number | source address |
//! | 3 | test-and-set mutex | mutex id | — |
//!
//! Any other number faults the calling task with [`Fault::UnknownSyscall`].
//!
//! Mutexes have no dedicated release call: a holder releases by re-issuing
//! syscall 3 on the mutex it holds. On release, the head of the FIFO wait
//! queue is granted the mutex directly and woken; it never re-races.

use crate::machine::errors::Fault;
use crate::machine::state::MachineState;
use crate::scheduler::task::{TaskId, WaitReason};
use std::collections::{BTreeMap, VecDeque};

/// Alarm: park until `r1` ticks elapse.
pub const SYS_ALARM: i64 = 0;
/// Disk read: block `r1` into memory at `r2`.
pub const SYS_DISK_READ: i64 = 1;
/// Disk write: memory at `r2` onto block `r1`.
pub const SYS_DISK_WRITE: i64 = 2;
/// Test-and-set (and release) of mutex `r1`.
pub const SYS_MUTEX: i64 = 3;

/// State-transition directive for the calling task.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SyscallEffect {
    /// The task keeps running and proceeds to its next instruction.
    Continue,
    /// The task keeps running, and the named task was granted a released
    /// mutex: the scheduler must move it from Waiting to Ready.
    ContinueAndWake(TaskId),
    /// The task parks until the reason resolves.
    Block(WaitReason),
}

/// Interprets one syscall against the scheduler-owned resources.
///
/// Reads the calling task's registers but never writes them; all machine
/// effects of a syscall (disk transfers) happen at completion time.
pub(super) fn dispatch(
    number: i64,
    caller: TaskId,
    machine: &MachineState,
    now: u64,
    mutexes: &mut MutexTable,
    disk: &Disk,
) -> Result<SyscallEffect, Fault> {
    match number {
        SYS_ALARM => {
            let delta = machine.register(1)?;
            if delta <= 0 {
                // A sleep of nothing is a no-op, not an error.
                return Ok(SyscallEffect::Continue);
            }
            Ok(SyscallEffect::Block(WaitReason::Timer {
                wake_tick: now.saturating_add(delta as u64),
            }))
        }
        SYS_DISK_READ | SYS_DISK_WRITE => {
            let op = if number == SYS_DISK_READ {
                DiskOp::Read
            } else {
                DiskOp::Write
            };
            let block = machine.register(1)?;
            let addr = machine.register(2)?;
            let request = disk.begin(now, op, block, addr, machine.memory().len())?;
            Ok(SyscallEffect::Block(WaitReason::Disk(request)))
        }
        SYS_MUTEX => {
            let id = machine.register(1)?;
            Ok(match mutexes.test_and_set(id, caller) {
                MutexOutcome::Acquired => SyscallEffect::Continue,
                MutexOutcome::Blocked => SyscallEffect::Block(WaitReason::Mutex { id }),
                MutexOutcome::Released(Some(next)) => SyscallEffect::ContinueAndWake(next),
                MutexOutcome::Released(None) => SyscallEffect::Continue,
            })
        }
        _ => Err(Fault::UnknownSyscall { number }),
    }
}

/// Result of a test-and-set on one mutex.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(super) enum MutexOutcome {
    /// The mutex was free; the caller now holds it.
    Acquired,
    /// Held by another task; the caller was FIFO-enqueued.
    Blocked,
    /// The caller held it and released; the payload is the wait-queue head
    /// that was granted the mutex, if any.
    Released(Option<TaskId>),
}

#[derive(Clone, Debug, Default)]
struct Mutex {
    holder: Option<TaskId>,
    waiters: VecDeque<TaskId>,
}

/// Global mutex table shared by all tasks.
///
/// Mutex ids spring into existence on first use; the table is keyed by the
/// raw `i64` id so a task can name any mutex it likes.
#[derive(Clone, Debug, Default)]
pub struct MutexTable {
    mutexes: BTreeMap<i64, Mutex>,
}

impl MutexTable {
    pub(super) fn new() -> Self {
        Self::default()
    }

    /// The atomic test-and-set: acquire if free, enqueue if held by another,
    /// release (and hand off to the FIFO head) if held by the caller.
    pub(super) fn test_and_set(&mut self, id: i64, caller: TaskId) -> MutexOutcome {
        let mutex = self.mutexes.entry(id).or_default();
        match mutex.holder {
            None => {
                mutex.holder = Some(caller);
                MutexOutcome::Acquired
            }
            Some(holder) if holder == caller => {
                let next = mutex.waiters.pop_front();
                mutex.holder = next;
                MutexOutcome::Released(next)
            }
            Some(_) => {
                mutex.waiters.push_back(caller);
                MutexOutcome::Blocked
            }
        }
    }

    /// Current holder of a mutex, if it is held.
    pub fn holder(&self, id: i64) -> Option<TaskId> {
        self.mutexes.get(&id).and_then(|m| m.holder)
    }

    /// Number of tasks queued on a mutex.
    pub fn waiters(&self, id: i64) -> usize {
        self.mutexes.get(&id).map_or(0, |m| m.waiters.len())
    }

    /// Removes a task from every wait queue and releases every mutex it
    /// holds, granting each to its FIFO head. Returns the granted tasks.
    pub(super) fn purge(&mut self, task: TaskId) -> Vec<TaskId> {
        let mut granted = Vec::new();
        for mutex in self.mutexes.values_mut() {
            mutex.waiters.retain(|&waiter| waiter != task);
            if mutex.holder == Some(task) {
                let next = mutex.waiters.pop_front();
                mutex.holder = next;
                if let Some(next) = next {
                    granted.push(next);
                }
            }
        }
        granted
    }
}

/// Which way a disk transfer moves data.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DiskOp {
    /// Disk block into task memory.
    Read,
    /// Task memory onto disk block.
    Write,
}

/// An in-flight disk transfer, validated at issue time.
///
/// Completion is infallible: block and memory window were both checked when
/// the request was made, so a woken task cannot fault retroactively.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DiskRequest {
    /// Transfer direction.
    pub op: DiskOp,
    /// Block index on the disk.
    pub block: usize,
    /// First word of the task-memory window.
    pub addr: usize,
    /// Clock tick at which the transfer completes.
    pub ready_tick: u64,
}

/// Simulated disk geometry and timing.
///
/// These numbers are configuration, not architecture: the instruction set
/// fixes only the shape of the contract (block-addressed, fixed latency).
#[derive(Clone, Debug)]
pub struct DiskConfig {
    /// Number of blocks in the store.
    pub blocks: usize,
    /// Words per block, transferred as one unit.
    pub block_words: usize,
    /// Ticks between request and completion.
    pub latency_ticks: u64,
}

impl Default for DiskConfig {
    fn default() -> Self {
        Self {
            blocks: 64,
            block_words: 8,
            latency_ticks: 16,
        }
    }
}

/// Simulated block store, external to every task's memory.
#[derive(Clone, Debug)]
pub struct Disk {
    config: DiskConfig,
    words: Vec<i64>,
}

impl Disk {
    pub(super) fn new(config: DiskConfig) -> Self {
        let words = vec![0; config.blocks * config.block_words];
        Self { config, words }
    }

    /// The disk's geometry and timing.
    pub fn config(&self) -> &DiskConfig {
        &self.config
    }

    /// Returns the words of one block, if the index is in range.
    pub fn block(&self, block: usize) -> Option<&[i64]> {
        if block >= self.config.blocks {
            return None;
        }
        let start = block * self.config.block_words;
        Some(&self.words[start..start + self.config.block_words])
    }

    /// Seeds a block with data, zero-padding a short slice.
    ///
    /// Returns [`Fault::BadAddress`] if the block index is out of range or
    /// the data is longer than a block.
    pub fn load_block(&mut self, block: usize, data: &[i64]) -> Result<(), Fault> {
        if block >= self.config.blocks || data.len() > self.config.block_words {
            return Err(Fault::BadAddress {
                address: block as i64,
                limit: self.config.blocks,
            });
        }
        let start = block * self.config.block_words;
        self.words[start..start + data.len()].copy_from_slice(data);
        self.words[start + data.len()..start + self.config.block_words].fill(0);
        Ok(())
    }

    /// Validates and opens a transfer request.
    ///
    /// Returns [`Fault::BadAddress`] if the block index or the task-memory
    /// window `[addr, addr + block_words)` is out of range.
    pub(super) fn begin(
        &self,
        now: u64,
        op: DiskOp,
        block: i64,
        addr: i64,
        memory_len: usize,
    ) -> Result<DiskRequest, Fault> {
        let block = usize::try_from(block)
            .ok()
            .filter(|&b| b < self.config.blocks)
            .ok_or(Fault::BadAddress {
                address: block,
                limit: self.config.blocks,
            })?;
        let addr = usize::try_from(addr)
            .ok()
            .filter(|&a| {
                a.checked_add(self.config.block_words)
                    .is_some_and(|end| end <= memory_len)
            })
            .ok_or(Fault::BadAddress {
                address: addr,
                limit: memory_len,
            })?;
        Ok(DiskRequest {
            op,
            block,
            addr,
            ready_tick: now.saturating_add(self.config.latency_ticks),
        })
    }

    /// Performs the word transfer for a completed request.
    pub(super) fn complete(&mut self, request: &DiskRequest, memory: &mut [i64]) {
        let words = self.config.block_words;
        let disk = request.block * words..(request.block + 1) * words;
        let mem = request.addr..request.addr + words;
        match request.op {
            DiskOp::Read => memory[mem].copy_from_slice(&self.words[disk]),
            DiskOp::Write => self.words[disk].copy_from_slice(&memory[mem]),
        }
    }
}
