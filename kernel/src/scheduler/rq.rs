/*
 * Run-Queue Subsystem
 *
 * Each CPU owns one `RunQueue`: a `spin::Mutex`-guarded set of per-major
 * FIFO sub-queues plus the two-layer ready bitmap that lets `pick_next`
 * find the highest-priority non-empty queue in O(1) instead of scanning
 * all 64 majors.
 *
 * Layout of the bitmap:
 *   - `groups[g]` (an AtomicU8) has bit `b` set iff major `g*8+b` has a
 *     runnable process enqueued.
 *   - `top` (an AtomicU8) has bit `g` set iff `groups[g] != 0`.
 * `highest_ready()` is therefore two `trailing_zeros()` calls: one over
 * `top` to find the group, one over `groups[g]` to find the major within
 * it. Total footprint: 1 + 8 bytes, matching the top-8-bit/secondary-64-bit
 * split.
 */

use alloc::collections::VecDeque;
use core::sync::atomic::{AtomicU8, Ordering};
use lazy_static::lazy_static;
use spin::Mutex;

use super::process::Pid;
use super::types::{CpuId, NR_CPUS};

const NUM_GROUPS: usize = 8;

pub struct ReadyMask {
    top: AtomicU8,
    groups: [AtomicU8; NUM_GROUPS],
}

impl ReadyMask {
    pub const fn new() -> Self {
        ReadyMask {
            top: AtomicU8::new(0),
            groups: [
                AtomicU8::new(0), AtomicU8::new(0), AtomicU8::new(0), AtomicU8::new(0),
                AtomicU8::new(0), AtomicU8::new(0), AtomicU8::new(0), AtomicU8::new(0),
            ],
        }
    }

    fn split(major: u8) -> (usize, u8) {
        ((major / 8) as usize, 1u8 << (major % 8))
    }

    pub fn set(&self, major: u8) {
        let (group, bit) = Self::split(major);
        let prev = self.groups[group].fetch_or(bit, Ordering::AcqRel);
        if prev == 0 {
            self.top.fetch_or(1u8 << group, Ordering::AcqRel);
        }
    }

    pub fn clear(&self, major: u8) {
        let (group, bit) = Self::split(major);
        let prev = self.groups[group].fetch_and(!bit, Ordering::AcqRel);
        if prev & bit != 0 && (prev & !bit) == 0 {
            self.top.fetch_and(!(1u8 << group), Ordering::AcqRel);
        }
    }

    /// Lowest-numbered (highest-priority) non-empty major, if any.
    pub fn highest_ready(&self) -> Option<u8> {
        let top = self.top.load(Ordering::Acquire);
        if top == 0 {
            return None;
        }
        let group = top.trailing_zeros() as usize;
        let bits = self.groups[group].load(Ordering::Acquire);
        if bits == 0 {
            return None;
        }
        Some((group as u8) * 8 + bits.trailing_zeros() as u8)
    }
}

/// One priority level's worth of runnable processes, split into four
/// minor sub-queues for coarse round-robin spread.
#[derive(Default)]
struct MajorQueues {
    minors: [VecDeque<Pid>; 4],
}

impl MajorQueues {
    fn is_empty(&self) -> bool {
        self.minors.iter().all(|q| q.is_empty())
    }

    fn push_back(&mut self, minor: u8, pid: Pid) {
        self.minors[(minor & 0x3) as usize].push_back(pid);
    }

    fn pop_front(&mut self) -> Option<Pid> {
        for q in self.minors.iter_mut() {
            if let Some(pid) = q.pop_front() {
                return Some(pid);
            }
        }
        None
    }

    fn front(&self) -> Option<Pid> {
        self.minors.iter().find_map(|q| q.front().copied())
    }

    fn len(&self) -> usize {
        self.minors.iter().map(|q| q.len()).sum()
    }

    fn remove(&mut self, pid: Pid) -> bool {
        for q in self.minors.iter_mut() {
            if let Some(pos) = q.iter().position(|&p| p == pid) {
                q.remove(pos);
                return true;
            }
        }
        false
    }
}

/// A single CPU's run queue: FIFO majors 1..=62 plus the idle major (63).
/// Major 0 (`EXIT_MAJOR_PRIORITY`) never gets a `MajorQueues` entry.
pub struct RunQueue {
    pub cpu: CpuId,
    mask: ReadyMask,
    majors: alloc::collections::BTreeMap<u8, MajorQueues>,
    pub current: Option<Pid>,
    pub need_resched: core::sync::atomic::AtomicBool,
}

impl RunQueue {
    pub fn new(cpu: CpuId) -> Self {
        RunQueue {
            cpu,
            mask: ReadyMask::new(),
            majors: alloc::collections::BTreeMap::new(),
            current: None,
            need_resched: core::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn enqueue(&mut self, pid: Pid, major: u8, minor: u8) {
        let entry = self.majors.entry(major).or_default();
        entry.push_back(minor, pid);
        self.mask.set(major);
    }

    pub fn dequeue(&mut self, pid: Pid, major: u8) -> bool {
        let removed = self
            .majors
            .get_mut(&major)
            .map(|q| q.remove(pid))
            .unwrap_or(false);
        if removed {
            if self.majors.get(&major).map(|q| q.is_empty()).unwrap_or(false) {
                self.mask.clear(major);
            }
        }
        removed
    }

    /// Look at the highest-priority runnable pid without removing it.
    pub fn peek_highest(&self) -> Option<Pid> {
        let major = self.mask.highest_ready()?;
        self.majors.get(&major)?.front()
    }

    /// Pop the highest-priority runnable pid, if any.
    pub fn pop_highest(&mut self) -> Option<Pid> {
        let major = self.mask.highest_ready()?;
        let entry = self.majors.get_mut(&major)?;
        let pid = entry.pop_front();
        if entry.is_empty() {
            self.mask.clear(major);
        }
        pid
    }

    /// Number of runnable pids queued at `major`, across all its minor
    /// sub-queues. Used by placement to compare load between candidate
    /// CPUs at a specific priority level.
    pub fn major_len(&self, major: u8) -> usize {
        self.majors.get(&major).map(|m| m.len()).unwrap_or(0)
    }

    pub fn request_reschedule(&self) {
        self.need_resched.store(true, Ordering::Release);
    }

    pub fn take_reschedule(&self) -> bool {
        self.need_resched.swap(false, Ordering::AcqRel)
    }
}

/// Active-CPU mask: which of the `NR_CPUS` rows in `RQS` are real,
/// running CPUs. Only bit 0 (BSP) is ever set by this kernel.
static ACTIVE_CPUS: AtomicU8 = AtomicU8::new(0);

pub fn mark_cpu_active(cpu: CpuId) {
    ACTIVE_CPUS.fetch_or(1 << cpu.0, Ordering::AcqRel);
}

pub fn is_cpu_active(cpu: CpuId) -> bool {
    ACTIVE_CPUS.load(Ordering::Acquire) & (1 << cpu.0) != 0
}

pub fn active_cpu_mask() -> u8 {
    ACTIVE_CPUS.load(Ordering::Acquire)
}

pub struct RunQueueTable {
    pub rqs: [Mutex<RunQueue>; NR_CPUS],
}

impl RunQueueTable {
    pub fn new() -> Self {
        RunQueueTable {
            rqs: core::array::from_fn(|i| Mutex::new(RunQueue::new(CpuId(i as u8)))),
        }
    }

    pub fn with<R>(&self, cpu: CpuId, f: impl FnOnce(&mut RunQueue) -> R) -> R {
        f(&mut self.rqs[cpu.as_usize()].lock())
    }

    /// Pick the least-loaded active CPU for placement. With only the BSP
    /// ever active this degenerates to always returning it, but the
    /// comparison is written generically so bringing up real APs later is
    /// a matter of flipping `ACTIVE_CPUS`, not rewriting placement.
    pub fn least_loaded_active(&self) -> CpuId {
        let mut best = CpuId::BSP;
        let mut best_len = usize::MAX;
        for i in 0..NR_CPUS {
            let cpu = CpuId(i as u8);
            if !is_cpu_active(cpu) {
                continue;
            }
            let len = self.rqs[i].lock().majors.values().map(|m| m.len()).sum::<usize>();
            if len < best_len {
                best_len = len;
                best = cpu;
            }
        }
        best
    }

    /// FIFO placement: prefer the calling CPU if its sub-queue at `major`
    /// is empty; else the fewest-loaded CPU at `major` among
    /// `affinity ∩ active`; fall back to `least_loaded_active` (ignoring
    /// affinity) if that intersection is empty.
    pub fn select_for_affinity(&self, major: u8, affinity: u8) -> CpuId {
        let here = super::types::this_cpu();
        if affinity & (1 << here.0) != 0 && is_cpu_active(here) {
            if self.rqs[here.as_usize()].lock().major_len(major) == 0 {
                return here;
            }
        }

        let mut best: Option<(CpuId, usize)> = None;
        for i in 0..NR_CPUS {
            let cpu = CpuId(i as u8);
            if !is_cpu_active(cpu) || affinity & (1 << i) == 0 {
                continue;
            }
            let len = self.rqs[i].lock().major_len(major);
            if best.map(|(_, best_len)| len < best_len).unwrap_or(true) {
                best = Some((cpu, len));
            }
        }
        best.map(|(cpu, _)| cpu).unwrap_or_else(|| self.least_loaded_active())
    }
}

lazy_static! {
    static ref RQS: RunQueueTable = RunQueueTable::new();
}

pub fn table() -> &'static RunQueueTable {
    &RQS
}
