use core::ops::{BitOr, BitOrAssign};

/// Generates the shared bitset plumbing for the flag newtypes below.
macro_rules! bitset {
    ($name:ident, $repr:ty) => {
        impl $name {
            /// No bits set.
            pub const None: $name = $name(0);

            /// Returns the raw bit representation.
            pub const fn bits(self) -> $repr {
                self.0
            }

            /// Checks if every bit of `other` is set in `self`.
            pub const fn contains(self, other: $name) -> bool {
                (self.0 & other.0) == other.0
            }

            /// Checks if no bit is set.
            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::None
            }
        }

        impl BitOr for $name {
            type Output = Self;

            fn bitor(self, rhs: Self) -> Self::Output {
                $name(self.0 | rhs.0)
            }
        }

        impl BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.0 |= rhs.0;
            }
        }
    };
}

/// Process creation flags (`dwCreationFlags`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct CreationFlags(pub u32);

bitset!(CreationFlags, u32);

impl CreationFlags {
    /// Debug the new process and every process it creates.
    pub const DebugProcess: CreationFlags = CreationFlags(0x0000_0001);

    /// Debug the new process only.
    pub const DebugOnlyThisProcess: CreationFlags = CreationFlags(0x0000_0002);

    /// Create the primary thread suspended until `ResumeThread`.
    pub const Suspended: CreationFlags = CreationFlags(0x0000_0004);

    /// Do not attach the new console process to the caller's console.
    pub const DetachedProcess: CreationFlags = CreationFlags(0x0000_0008);

    /// Give the new console process its own console window.
    pub const NewConsole: CreationFlags = CreationFlags(0x0000_0010);

    /// Make the new process the root of a new process group.
    pub const NewProcessGroup: CreationFlags = CreationFlags(0x0000_0200);

    /// The environment block holds UTF-16 characters.
    pub const UnicodeEnvironment: CreationFlags = CreationFlags(0x0000_0400);

    /// Run a 16-bit application in a private VDM.
    pub const SeparateWowVdm: CreationFlags = CreationFlags(0x0000_0800);

    /// Run a 16-bit application in the shared VDM.
    pub const SharedWowVdm: CreationFlags = CreationFlags(0x0000_1000);

    /// Inherit the parent's processor affinity.
    pub const InheritParentAffinity: CreationFlags = CreationFlags(0x0001_0000);

    /// Create a protected process.
    pub const ProtectedProcess: CreationFlags = CreationFlags(0x0004_0000);

    /// Set on every call that passes a `STARTUPINFOEXW` with an attribute list.
    pub const ExtendedStartupInfoPresent: CreationFlags = CreationFlags(0x0008_0000);

    /// Do not put the new process in the caller's job.
    pub const BreakawayFromJob: CreationFlags = CreationFlags(0x0100_0000);

    /// Keep the caller's software restriction level.
    pub const PreserveCodeAuthZLevel: CreationFlags = CreationFlags(0x0200_0000);

    /// Do not inherit the caller's error mode.
    pub const DefaultErrorMode: CreationFlags = CreationFlags(0x0400_0000);

    /// Run a console process without a console window.
    pub const NoWindow: CreationFlags = CreationFlags(0x0800_0000);
}

/// Logon flags for `CreateProcessWithLogonW` and `CreateProcessWithTokenW`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct LogonFlags(pub u32);

bitset!(LogonFlags, u32);

impl LogonFlags {
    /// Load the user profile (`/profile`).
    pub const WithProfile: LogonFlags = LogonFlags(1);

    /// Use the credentials for network access only (`/netonly`).
    pub const NetCredentialsOnly: LogonFlags = LogonFlags(2);
}

/// First generation of `PROCESS_CREATION_MITIGATION_POLICY_*` bits.
///
/// Most policies take a two-bit field: `1` forces the mitigation on, `2` forces it off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct MitigationOptions(pub u64);

bitset!(MitigationOptions, u64);

impl MitigationOptions {
    /// Data execution prevention.
    pub const DepEnable: MitigationOptions = MitigationOptions(0x01);

    /// DEP with ATL thunk emulation.
    pub const DepAtlThunkEnable: MitigationOptions = MitigationOptions(0x02);

    /// Structured exception handler overwrite protection.
    pub const SehopEnable: MitigationOptions = MitigationOptions(0x04);

    /// Mandatory ASLR for images not built with `/DYNAMICBASE`.
    pub const ForceRelocateImagesAlwaysOn: MitigationOptions = MitigationOptions(1 << 8);

    /// No mandatory ASLR.
    pub const ForceRelocateImagesAlwaysOff: MitigationOptions = MitigationOptions(2 << 8);

    /// Mandatory ASLR; images without relocations fail to load.
    pub const ForceRelocateImagesAlwaysOnRequireRelocs: MitigationOptions =
        MitigationOptions(3 << 8);

    /// Terminate the process on heap corruption.
    pub const HeapTerminateAlwaysOn: MitigationOptions = MitigationOptions(1 << 12);

    /// Do not terminate on heap corruption.
    pub const HeapTerminateAlwaysOff: MitigationOptions = MitigationOptions(2 << 12);

    /// Randomize bottom-up allocations.
    pub const BottomUpAslrAlwaysOn: MitigationOptions = MitigationOptions(1 << 16);

    /// No bottom-up randomization.
    pub const BottomUpAslrAlwaysOff: MitigationOptions = MitigationOptions(2 << 16);

    /// Use up to 1 TB of bottom-up variance (64-bit only).
    pub const HighEntropyAslrAlwaysOn: MitigationOptions = MitigationOptions(1 << 20);

    /// No high-entropy ASLR.
    pub const HighEntropyAslrAlwaysOff: MitigationOptions = MitigationOptions(2 << 20);

    /// Raise an exception on invalid handle use.
    pub const StrictHandleChecksAlwaysOn: MitigationOptions = MitigationOptions(1 << 24);

    /// No strict handle checks.
    pub const StrictHandleChecksAlwaysOff: MitigationOptions = MitigationOptions(2 << 24);

    /// Block `win32k.sys` system calls.
    pub const Win32kSystemCallDisableAlwaysOn: MitigationOptions = MitigationOptions(1 << 28);

    /// Allow `win32k.sys` system calls.
    pub const Win32kSystemCallDisableAlwaysOff: MitigationOptions = MitigationOptions(2 << 28);

    /// Block legacy extension points such as AppInit DLLs.
    pub const ExtensionPointDisableAlwaysOn: MitigationOptions = MitigationOptions(1 << 32);

    /// Allow legacy extension points.
    pub const ExtensionPointDisableAlwaysOff: MitigationOptions = MitigationOptions(2 << 32);

    /// Arbitrary code guard: no dynamic code generation.
    pub const ProhibitDynamicCodeAlwaysOn: MitigationOptions = MitigationOptions(1 << 36);

    /// Allow dynamic code generation.
    pub const ProhibitDynamicCodeAlwaysOff: MitigationOptions = MitigationOptions(2 << 36);

    /// Arbitrary code guard with per-thread opt out.
    pub const ProhibitDynamicCodeAlwaysOnAllowOptOut: MitigationOptions =
        MitigationOptions(3 << 36);

    /// Control flow guard.
    pub const ControlFlowGuardAlwaysOn: MitigationOptions = MitigationOptions(1 << 40);

    /// No control flow guard.
    pub const ControlFlowGuardAlwaysOff: MitigationOptions = MitigationOptions(2 << 40);

    /// Control flow guard with export suppression.
    pub const ControlFlowGuardExportSuppression: MitigationOptions = MitigationOptions(3 << 40);

    /// Only load images signed by Microsoft.
    pub const BlockNonMicrosoftBinariesAlwaysOn: MitigationOptions = MitigationOptions(1 << 44);

    /// Load images regardless of signer.
    pub const BlockNonMicrosoftBinariesAlwaysOff: MitigationOptions = MitigationOptions(2 << 44);

    /// Only load images signed by Microsoft or the Store.
    pub const BlockNonMicrosoftBinariesAllowStore: MitigationOptions = MitigationOptions(3 << 44);

    /// Block fonts outside the system font directory.
    pub const FontDisableAlwaysOn: MitigationOptions = MitigationOptions(1 << 48);

    /// Allow non-system fonts.
    pub const FontDisableAlwaysOff: MitigationOptions = MitigationOptions(2 << 48);

    /// Log, but allow, non-system fonts.
    pub const AuditNonSystemFonts: MitigationOptions = MitigationOptions(3 << 48);

    /// Block images from remote devices.
    pub const ImageLoadNoRemoteAlwaysOn: MitigationOptions = MitigationOptions(1 << 52);

    /// Allow images from remote devices.
    pub const ImageLoadNoRemoteAlwaysOff: MitigationOptions = MitigationOptions(2 << 52);

    /// Block images with a low mandatory label.
    pub const ImageLoadNoLowLabelAlwaysOn: MitigationOptions = MitigationOptions(1 << 56);

    /// Allow images with a low mandatory label.
    pub const ImageLoadNoLowLabelAlwaysOff: MitigationOptions = MitigationOptions(2 << 56);

    /// Search `System32` before the application directory.
    pub const ImageLoadPreferSystem32AlwaysOn: MitigationOptions = MitigationOptions(1 << 60);

    /// Use the default DLL search order.
    pub const ImageLoadPreferSystem32AlwaysOff: MitigationOptions = MitigationOptions(2 << 60);
}

/// Second generation of mitigation policy bits, sent as the second `u64` of the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct MitigationOptions2(pub u64);

bitset!(MitigationOptions2, u64);

impl MitigationOptions2 {
    /// Block images that are not code-integrity continuous.
    pub const LoadIntegrityContinuityAlwaysOn: MitigationOptions2 = MitigationOptions2(1 << 4);

    /// No load integrity continuity checks.
    pub const LoadIntegrityContinuityAlwaysOff: MitigationOptions2 = MitigationOptions2(2 << 4);

    /// Log load integrity continuity violations.
    pub const LoadIntegrityContinuityAudit: MitigationOptions2 = MitigationOptions2(3 << 4);

    /// Strict control flow guard: only CFG-enabled images load.
    pub const StrictControlFlowGuardAlwaysOn: MitigationOptions2 = MitigationOptions2(1 << 8);

    /// No strict control flow guard.
    pub const StrictControlFlowGuardAlwaysOff: MitigationOptions2 = MitigationOptions2(2 << 8);
}
