use core::{ffi::c_void, mem::size_of};

use tracing::debug;

use crate::{
    config::LaunchConfig,
    error::Result,
    flags::{MitigationOptions, MitigationOptions2},
    handle::HandleValue,
    native::{AttributeListRef, Native},
    resources::ScopedResources,
};

const PROC_THREAD_ATTRIBUTE_THREAD: usize = 0x0001_0000;
const PROC_THREAD_ATTRIBUTE_INPUT: usize = 0x0002_0000;
const PROC_THREAD_ATTRIBUTE_ADDITIVE: usize = 0x0004_0000;

/// Attribute kinds understood by `UpdateProcThreadAttribute`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcThreadAttribute {
    /// A `HANDLE` to the process that becomes the parent.
    ParentProcess,

    /// An array of `HANDLE`s, the only handles the child inherits.
    HandleList,

    /// One or two `u64` mitigation policy bitsets.
    MitigationPolicy,

    /// A `u32` child process policy.
    ChildProcessPolicy,

    /// Any other attribute, already encoded.
    Raw(usize),
}

impl ProcThreadAttribute {
    /// The `Attribute` argument for `UpdateProcThreadAttribute`.
    pub fn value(self) -> usize {
        match self {
            ProcThreadAttribute::ParentProcess => encode(0, false, true, false),
            ProcThreadAttribute::HandleList => encode(2, false, true, false),
            ProcThreadAttribute::MitigationPolicy => encode(7, false, true, false),
            ProcThreadAttribute::ChildProcessPolicy => encode(14, false, true, false),
            ProcThreadAttribute::Raw(value) => value,
        }
    }
}

fn encode(number: usize, thread: bool, input: bool, additive: bool) -> usize {
    let mut value = number;
    if thread {
        value |= PROC_THREAD_ATTRIBUTE_THREAD;
    }
    if input {
        value |= PROC_THREAD_ATTRIBUTE_INPUT;
    }
    if additive {
        value |= PROC_THREAD_ATTRIBUTE_ADDITIVE;
    }
    value
}

/// Payload of the mitigation policy attribute: the first generation alone, or both
/// generations back to back when the second one is set.
pub fn mitigation_payload(options: MitigationOptions, options2: MitigationOptions2) -> Vec<u8> {
    let mut payload = options.bits().to_le_bytes().to_vec();
    if !options2.is_empty() {
        payload.extend_from_slice(&options2.bits().to_le_bytes());
    }
    payload
}

/// An initialized `PROC_THREAD_ATTRIBUTE_LIST` and the values it points at.
///
/// The OS keeps pointers into the value buffers, so they are owned here and only
/// released when the list is dropped: values first, then the native list.
pub struct AttributeList<'n, N: Native + ?Sized> {
    native: &'n N,
    buffer: Vec<usize>,
    count: u32,
    values: ScopedResources<'static>,
    initialized: bool,
}

impl<'n, N: Native + ?Sized> AttributeList<'n, N> {
    /// Sizes, allocates and initializes a list for exactly `count` attributes.
    pub fn new(native: &'n N, count: u32) -> Result<Self> {
        let size = native.attribute_list_size(count);
        let mut list = Self {
            native,
            buffer: vec![0usize; size.div_ceil(size_of::<usize>()).max(1)],
            count,
            values: ScopedResources::new(),
            initialized: false,
        };

        unsafe { native.initialize_attribute_list(list.as_mut_ptr(), count, size)? };
        list.initialized = true;
        Ok(list)
    }

    /// Builds the list a launch config asks for, or `None` when it needs no attributes.
    ///
    /// The parent process is added first, then the mitigation policy.
    pub fn for_config(native: &'n N, config: &LaunchConfig<'_>) -> Result<Option<Self>> {
        let count = config.attribute_count();
        debug!(count, "building extended startup attributes");
        if count == 0 {
            return Ok(None);
        }

        let mut list = Self::new(native, count)?;
        if let Some(parent) = config.parent_process {
            list.push_handle(ProcThreadAttribute::ParentProcess, parent.raw())?;
        }

        if !config.mitigation_options.is_empty() || !config.mitigation_options2.is_empty() {
            let payload = mitigation_payload(config.mitigation_options, config.mitigation_options2);
            list.push(ProcThreadAttribute::MitigationPolicy, payload)?;
        }

        Ok(Some(list))
    }

    /// Adds one attribute. The list copies `value` into an 8-byte aligned buffer and
    /// keeps it alive until the list is dropped.
    pub fn push(&mut self, attribute: ProcThreadAttribute, value: Vec<u8>) -> Result<()> {
        let list = self.as_mut_ptr();
        let len = value.len();
        let mut words = vec![0u64; len.div_ceil(size_of::<u64>())].into_boxed_slice();
        for (word, chunk) in words.iter_mut().zip(value.chunks(size_of::<u64>())) {
            let mut bytes = [0u8; size_of::<u64>()];
            bytes[..chunk.len()].copy_from_slice(chunk);
            *word = u64::from_ne_bytes(bytes);
        }

        let stored = self.values.add(words);
        // `stored` spans at least `len` bytes and lives as long as the list.
        let value = unsafe { core::slice::from_raw_parts(stored.as_ptr().cast::<u8>(), len) };
        unsafe { self.native.update_attribute(list, attribute.value(), value) }
    }

    /// Adds a handle-valued attribute. Only the value is recorded; ownership stays
    /// with the caller.
    pub fn push_handle(
        &mut self,
        attribute: ProcThreadAttribute,
        handle: HandleValue,
    ) -> Result<()> {
        self.push(attribute, handle.0.to_le_bytes().to_vec())
    }

    /// Adds a `PROC_THREAD_ATTRIBUTE_HANDLE_LIST` restricting inheritance to `handles`.
    pub fn push_handle_list(&mut self, handles: &[HandleValue]) -> Result<()> {
        let payload = handles.iter().flat_map(|h| h.0.to_le_bytes()).collect();
        self.push(ProcThreadAttribute::HandleList, payload)
    }

    /// Number of attributes the list was sized for.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// The raw list reference for a creation call.
    pub fn as_raw(&mut self) -> AttributeListRef {
        AttributeListRef {
            ptr: self.as_mut_ptr(),
            count: self.count,
        }
    }

    fn as_mut_ptr(&mut self) -> *mut c_void {
        self.buffer.as_mut_ptr().cast()
    }
}

impl<N: Native + ?Sized> Drop for AttributeList<'_, N> {
    fn drop(&mut self) {
        self.values.release();
        if self.initialized {
            let list = self.as_mut_ptr();
            if let Err(err) = unsafe { self.native.delete_attribute_list(list) } {
                debug!(error = %err, "attribute list deletion failed");
            }
        }
    }
}
