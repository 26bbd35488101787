use tracing::debug;

use crate::{
    error::Result,
    handle::{BorrowedHandle, HandleValue},
    native::{Native, ProcessInformation},
};

/// `STATUS_PROCESS_IS_TERMINATING`, the exit code used for terminate-on-dispose.
pub const STATUS_PROCESS_IS_TERMINATING: u32 = 0xC000_010A;

/// A created process: owns its process and thread handles and remembers both ids.
///
/// Dropping it (or calling [`LaunchedProcess::close`]) terminates the process first
/// when terminate-on-dispose is set, then closes the thread handle and the process
/// handle.
pub struct LaunchedProcess<N: Native> {
    native: N,
    process: Option<HandleValue>,
    thread: Option<HandleValue>,
    process_id: u32,
    thread_id: u32,
    terminate_on_dispose: bool,
}

impl<N: Native> LaunchedProcess<N> {
    /// Takes ownership of the handles in `info`.
    pub fn from_information(
        native: N,
        info: ProcessInformation,
        terminate_on_dispose: bool,
    ) -> Self {
        Self {
            native,
            process: Some(info.process).filter(|h| h.is_valid()),
            thread: Some(info.thread).filter(|h| h.is_valid()),
            process_id: info.process_id,
            thread_id: info.thread_id,
            terminate_on_dispose,
        }
    }

    /// Gets the process ID.
    pub fn process_id(&self) -> u32 {
        self.process_id
    }

    /// Gets the initial thread ID.
    pub fn thread_id(&self) -> u32 {
        self.thread_id
    }

    /// The process handle, if it has not been closed.
    pub fn process_handle(&self) -> Option<BorrowedHandle<'_>> {
        self.process.map(|h| unsafe { BorrowedHandle::borrow_raw(h) })
    }

    /// The initial thread handle, if it has not been closed.
    pub fn thread_handle(&self) -> Option<BorrowedHandle<'_>> {
        self.thread.map(|h| unsafe { BorrowedHandle::borrow_raw(h) })
    }

    /// Whether releasing this value kills the process.
    pub fn terminate_on_dispose(&self) -> bool {
        self.terminate_on_dispose
    }

    /// Changes whether releasing this value kills the process.
    pub fn set_terminate_on_dispose(&mut self, terminate: bool) {
        self.terminate_on_dispose = terminate;
    }

    /// Terminates the process with `exit_code`.
    pub fn terminate(&self, exit_code: u32) -> Result<()> {
        match self.process {
            Some(process) => self.native.terminate_process(process, exit_code),
            None => Ok(()),
        }
    }

    /// Releases the handles now. Idempotent; returns the first close failure, after
    /// attempting to close both handles.
    pub fn close(&mut self) -> Result<()> {
        if self.terminate_on_dispose && self.process.is_some() {
            self.terminate_best_effort();
        }

        let thread = self.thread.take().map(|h| self.native.close_handle(h));
        let process = self.process.take().map(|h| self.native.close_handle(h));

        thread.unwrap_or(Ok(())).and(process.unwrap_or(Ok(())))
    }

    /// Gives up ownership of the handles; nothing is terminated or closed afterwards.
    pub fn into_raw_parts(mut self) -> ProcessInformation {
        self.terminate_on_dispose = false;
        ProcessInformation {
            process: self.process.take().unwrap_or(HandleValue::NULL),
            thread: self.thread.take().unwrap_or(HandleValue::NULL),
            process_id: self.process_id,
            thread_id: self.thread_id,
        }
    }

    /// Attempt, inspect, discard: the process may already have exited.
    fn terminate_best_effort(&self) {
        let outcome = self.terminate(STATUS_PROCESS_IS_TERMINATING);
        if let Err(err) = outcome {
            debug!(pid = self.process_id, error = %err, "terminate on dispose failed");
        }
    }
}

impl<N: Native> Drop for LaunchedProcess<N> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            debug!(pid = self.process_id, error = %err, "closing process handles failed");
        }
    }
}

impl<N: Native> core::fmt::Debug for LaunchedProcess<N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LaunchedProcess")
            .field("process", &self.process)
            .field("thread", &self.thread)
            .field("process_id", &self.process_id)
            .field("thread_id", &self.thread_id)
            .field("terminate_on_dispose", &self.terminate_on_dispose)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, MockNative};

    fn info() -> ProcessInformation {
        ProcessInformation {
            process: HandleValue(0x100),
            thread: HandleValue(0x104),
            process_id: 77,
            thread_id: 78,
        }
    }

    #[test]
    fn terminate_on_dispose_terminates_before_closing() {
        let native = MockNative::default();
        drop(LaunchedProcess::from_information(native.clone(), info(), true));

        assert_eq!(
            native.calls(),
            vec![
                Call::Terminate {
                    process: HandleValue(0x100),
                    exit_code: STATUS_PROCESS_IS_TERMINATING,
                },
                Call::Close { handle: HandleValue(0x104) },
                Call::Close { handle: HandleValue(0x100) },
            ]
        );
    }

    #[test]
    fn without_terminate_on_dispose_nothing_is_terminated() {
        let native = MockNative::default();
        drop(LaunchedProcess::from_information(native.clone(), info(), false));
        assert_eq!(native.call_names(), vec!["close", "close"]);
    }

    #[test]
    fn terminate_failure_is_swallowed() {
        let native = MockNative::default();
        native.fail("TerminateProcess", 5);

        let mut process = LaunchedProcess::from_information(native.clone(), info(), true);
        assert!(process.close().is_ok());
        assert_eq!(native.call_names(), vec!["terminate", "close", "close"]);
    }

    #[test]
    fn a_failing_close_does_not_skip_the_other_handle() {
        let native = MockNative::default();
        native.fail("CloseHandle", 6);

        let mut process = LaunchedProcess::from_information(native.clone(), info(), false);
        let err = process.close().expect_err("close failure");
        assert_eq!(err.code(), Some(6));
        assert_eq!(native.call_names(), vec!["close", "close"]);
    }

    #[test]
    fn close_is_idempotent() {
        let native = MockNative::default();
        let mut process = LaunchedProcess::from_information(native.clone(), info(), true);
        process.close().expect("close");
        process.close().expect("second close");
        drop(process);
        assert_eq!(native.call_names(), vec!["terminate", "close", "close"]);
        assert_eq!(native.calls().len(), 3);
    }

    #[test]
    fn into_raw_parts_transfers_ownership() {
        let native = MockNative::default();
        let process = LaunchedProcess::from_information(native.clone(), info(), true);
        assert_eq!(process.process_id(), 77);
        assert_eq!(process.thread_id(), 78);

        let raw = process.into_raw_parts();
        assert_eq!(raw, info());
        assert!(native.calls().is_empty());
    }
}
