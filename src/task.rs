// A task is the schedulable unit: one saved register/trapframe state,
// linked into the ring `sched.rs` walks. It does not own anything about
// the process it belongs to — only a back-reference, mirroring the
// split the comment in pmap.rs describes for page directories.

use crate::trap::Trapframe;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ProcessId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TaskStatus {
    Runnable,
    Running,
    Zombie,
}

pub(crate) struct Task {
    pub(crate) process_id: ProcessId,
    pub(crate) trapframe: Trapframe,
    pub(crate) status: TaskStatus,
}

impl Task {
    pub(crate) fn new(process_id: ProcessId) -> Task {
        Task {
            process_id,
            trapframe: Trapframe::new_for_user(),
            status: TaskStatus::Runnable,
        }
    }

    pub(crate) fn is_runnable(&self) -> bool {
        self.status == TaskStatus::Runnable
    }
}
