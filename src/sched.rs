// Cooperative task ring: no preemption lives here, only the two moves a
// process can force — yield control entirely (`exit`) or hand off to a
// freshly loaded process. The PIT tick in trap.rs never calls into this
// module.

use crate::process;
use crate::x86;

/// Run the very first task ever created. Does not return.
pub(crate) fn run_first_ever_task() -> ! {
    let id = process::next_runnable().expect("no initial task to run");
    process::switch_to(id);

    let tf = process::with_current(|p| p.task.trapframe).expect("current task vanished");
    crate::trap::pop_trapframe(&tf);
}

/// Pick the next runnable task after whichever just gave up the CPU
/// (via `exit`) and make it current, or halt if the ring is empty.
pub(crate) fn schedule_next() {
    match process::next_runnable() {
        Some(id) => process::switch_to(id),
        None => {
            println!("sched: no runnable tasks left, halting");
            loop {
                x86::hlt();
            }
        }
    }
}
