//! Streaming thread priority
//!
//! Called from the bus sync handler when a streaming thread announces that
//! its loop starts, so it runs on that thread. Only macOS raises the
//! priority; elsewhere this is a no-op.

#[cfg(target_os = "macos")]
pub(crate) fn raise_current_thread() {
    // SAFETY: sched_param is plain data and pthread_self() is always valid
    // for the calling thread.
    unsafe {
        let mut param: libc::sched_param = std::mem::zeroed();
        param.sched_priority = libc::sched_get_priority_max(libc::SCHED_RR);
        let rc = libc::pthread_setschedparam(libc::pthread_self(), libc::SCHED_RR, &param);
        if rc != 0 {
            tracing::debug!("Could not raise streaming thread priority: error {}", rc);
        }
    }
}

#[cfg(not(target_os = "macos"))]
pub(crate) fn raise_current_thread() {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raise_is_harmless() {
        // Unprivileged callers may be refused; the call must not panic
        std::thread::spawn(raise_current_thread).join().unwrap();
    }
}
