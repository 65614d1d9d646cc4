// Snapshot of the callee saved registers. Caller saved registers that hold
// live references were already spilled to the stack by whoever called into
// the collector, so these are the only ones that can hide a reference.

#[cfg(target_arch = "x86_64")]
#[inline(never)]
pub fn register_snapshot() -> Vec<usize> {
    use std::arch::asm;

    let (rbx, rbp, r12, r13, r14, r15): (usize, usize, usize, usize, usize, usize);

    // rbx and rbp are reserved by LLVM and can only be read from the template
    unsafe {
        asm!(
            "mov {rbx}, rbx",
            "mov {rbp}, rbp",
            rbx = out(reg) rbx,
            rbp = out(reg) rbp,
            out("r12") r12,
            out("r13") r13,
            out("r14") r14,
            out("r15") r15,
            options(nomem, nostack, preserves_flags),
        );
    }

    vec![rbx, rbp, r12, r13, r14, r15]
}

#[cfg(target_arch = "aarch64")]
#[inline(never)]
pub fn register_snapshot() -> Vec<usize> {
    use std::arch::asm;

    let (x19, x29): (usize, usize);
    let (x20, x21, x22, x23, x24, x25, x26, x27, x28): (
        usize,
        usize,
        usize,
        usize,
        usize,
        usize,
        usize,
        usize,
        usize,
    );

    // x19 and the frame pointer are reserved by LLVM
    unsafe {
        asm!(
            "mov {x19}, x19",
            "mov {x29}, x29",
            x19 = out(reg) x19,
            x29 = out(reg) x29,
            out("x20") x20,
            out("x21") x21,
            out("x22") x22,
            out("x23") x23,
            out("x24") x24,
            out("x25") x25,
            out("x26") x26,
            out("x27") x27,
            out("x28") x28,
            options(nomem, nostack, preserves_flags),
        );
    }

    vec![x19, x20, x21, x22, x23, x24, x25, x26, x27, x28, x29]
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
pub fn register_snapshot() -> Vec<usize> {
    Vec::new()
}
