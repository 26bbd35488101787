//! Recording [`Native`] backend for unit tests.

use core::ffi::c_void;
use std::{cell::RefCell, collections::HashMap, rc::Rc};

use crate::{
    error::{Error, Result},
    flags::{CreationFlags, LogonFlags},
    handle::{BorrowedHandle, HandleValue},
    native::{CreateRequest, Credentials, Native, ProcessInformation},
    security::SecurityAttributes,
};

/// What a request looked like when it reached the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub application_name: Option<String>,
    pub command_line: Option<String>,
    /// `(inherit_handle, has_descriptor)`
    pub process_attributes: Option<(bool, bool)>,
    pub thread_attributes: Option<(bool, bool)>,
    pub inherit_handles: bool,
    pub creation_flags: CreationFlags,
    pub desktop: Option<String>,
    pub title: Option<String>,
    pub attribute_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    SizeQuery { count: u32 },
    Initialize { count: u32, size: usize },
    Update { attribute: usize, value: Vec<u8> },
    Delete,
    CreateAsUser { token: HandleValue, request: RecordedRequest },
    CreateWithToken {
        token: HandleValue,
        logon_flags: LogonFlags,
        request: RecordedRequest,
    },
    CreateWithLogon {
        username: String,
        domain: Option<String>,
        logon_flags: LogonFlags,
        request: RecordedRequest,
    },
    CreateProcess { request: RecordedRequest },
    Terminate { process: HandleValue, exit_code: u32 },
    Close { handle: HandleValue },
}

#[derive(Debug)]
struct State {
    calls: Vec<Call>,
    value_addresses: Vec<usize>,
    failures: HashMap<&'static str, u32>,
    response: ProcessInformation,
}

/// A cloneable backend that records every call and fails the functions it is told to.
#[derive(Debug, Clone)]
pub struct MockNative {
    state: Rc<RefCell<State>>,
}

impl Default for MockNative {
    fn default() -> Self {
        Self {
            state: Rc::new(RefCell::new(State {
                calls: Vec::new(),
                value_addresses: Vec::new(),
                failures: HashMap::new(),
                response: ProcessInformation {
                    process: HandleValue(0x1a0),
                    thread: HandleValue(0x1a4),
                    process_id: 4242,
                    thread_id: 4343,
                },
            })),
        }
    }
}

impl MockNative {
    /// Makes every call to `function` fail with `code`.
    pub fn fail(&self, function: &'static str, code: u32) {
        self.state.borrow_mut().failures.insert(function, code);
    }

    /// Sets the process information returned by successful creation calls.
    pub fn respond_with(&self, info: ProcessInformation) {
        self.state.borrow_mut().response = info;
    }

    /// Every recorded call, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    /// Addresses of the attribute values passed to `UpdateProcThreadAttribute`.
    pub fn value_addresses(&self) -> Vec<usize> {
        self.state.borrow().value_addresses.clone()
    }

    /// Names of the recorded calls, in order.
    pub fn call_names(&self) -> Vec<&'static str> {
        self.state
            .borrow()
            .calls
            .iter()
            .map(|call| match call {
                Call::SizeQuery { .. } => "size",
                Call::Initialize { .. } => "initialize",
                Call::Update { .. } => "update",
                Call::Delete => "delete",
                Call::CreateAsUser { .. } => "as_user",
                Call::CreateWithToken { .. } => "with_token",
                Call::CreateWithLogon { .. } => "with_logon",
                Call::CreateProcess { .. } => "create",
                Call::Terminate { .. } => "terminate",
                Call::Close { .. } => "close",
            })
            .collect()
    }

    fn record(&self, function: &'static str, call: Call) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.calls.push(call);
        match state.failures.get(function) {
            Some(code) => Err(Error::native(function, *code)),
            None => Ok(()),
        }
    }

    fn created(&self, function: &'static str, call: Call) -> Result<ProcessInformation> {
        self.record(function, call)?;
        Ok(self.state.borrow().response)
    }
}

fn text(wide: Option<&[u16]>) -> Option<String> {
    wide.map(|w| String::from_utf16_lossy(w.strip_suffix(&[0u16]).unwrap_or(w)))
}

fn recorded(request: &CreateRequest<'_>) -> RecordedRequest {
    let attrs = |a: Option<SecurityAttributes>| {
        a.map(|a| (a.inherit_handle, a.descriptor.is_some()))
    };
    RecordedRequest {
        application_name: text(request.application_name),
        command_line: text(request.command_line),
        process_attributes: attrs(request.process_attributes),
        thread_attributes: attrs(request.thread_attributes),
        inherit_handles: request.inherit_handles,
        creation_flags: request.creation_flags,
        desktop: text(request.startup.desktop),
        title: text(request.startup.title),
        attribute_count: request.attribute_list.map_or(0, |list| list.count),
    }
}

impl Native for MockNative {
    fn attribute_list_size(&self, count: u32) -> usize {
        self.state.borrow_mut().calls.push(Call::SizeQuery { count });
        48 + 32 * count as usize
    }

    unsafe fn initialize_attribute_list(
        &self,
        _list: *mut c_void,
        count: u32,
        size: usize,
    ) -> Result<()> {
        self.record("InitializeProcThreadAttributeList", Call::Initialize { count, size })
    }

    unsafe fn update_attribute(
        &self,
        _list: *mut c_void,
        attribute: usize,
        value: &[u8],
    ) -> Result<()> {
        self.state.borrow_mut().value_addresses.push(value.as_ptr() as usize);
        let value = value.to_vec();
        self.record("UpdateProcThreadAttribute", Call::Update { attribute, value })
    }

    unsafe fn delete_attribute_list(&self, _list: *mut c_void) -> Result<()> {
        self.record("DeleteProcThreadAttributeList", Call::Delete)
    }

    fn create_process_as_user(
        &self,
        token: BorrowedHandle<'_>,
        request: &CreateRequest<'_>,
    ) -> Result<ProcessInformation> {
        let call = Call::CreateAsUser { token: token.raw(), request: recorded(request) };
        self.created("CreateProcessAsUserW", call)
    }

    fn create_process_with_token(
        &self,
        token: BorrowedHandle<'_>,
        logon_flags: LogonFlags,
        request: &CreateRequest<'_>,
    ) -> Result<ProcessInformation> {
        let call = Call::CreateWithToken {
            token: token.raw(),
            logon_flags,
            request: recorded(request),
        };
        self.created("CreateProcessWithTokenW", call)
    }

    fn create_process_with_logon(
        &self,
        credentials: &Credentials<'_>,
        logon_flags: LogonFlags,
        request: &CreateRequest<'_>,
    ) -> Result<ProcessInformation> {
        let call = Call::CreateWithLogon {
            username: text(Some(credentials.username)).unwrap_or_default(),
            domain: text(credentials.domain),
            logon_flags,
            request: recorded(request),
        };
        self.created("CreateProcessWithLogonW", call)
    }

    fn create_process(&self, request: &CreateRequest<'_>) -> Result<ProcessInformation> {
        self.created("CreateProcessW", Call::CreateProcess { request: recorded(request) })
    }

    fn terminate_process(&self, process: HandleValue, exit_code: u32) -> Result<()> {
        self.record("TerminateProcess", Call::Terminate { process, exit_code })
    }

    fn close_handle(&self, handle: HandleValue) -> Result<()> {
        self.record("CloseHandle", Call::Close { handle })
    }
}
