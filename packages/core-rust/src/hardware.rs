//! Host processor count used to derive the default HTTP thread pool size.

use crate::constraint::INT_MAX;

/// Source of the number of processing units available to the server.
///
/// Lets tests pin the processor count instead of depending on the machine
/// running them. The default implementation ([`HostProcessors`]) asks the OS.
pub trait ProcessorCount: Send + Sync {
    /// Returns the number of logical processors available to this process.
    fn available_processors(&self) -> usize;
}

/// Reads the logical processor count of the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostProcessors;

impl ProcessorCount for HostProcessors {
    fn available_processors(&self) -> usize {
        num_cpus::get()
    }
}

/// A fixed processor count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedProcessors(pub usize);

impl ProcessorCount for FixedProcessors {
    fn available_processors(&self) -> usize {
        self.0
    }
}

/// Default HTTP thread count for a host with `processors` logical CPUs:
/// `max(10, processors * 17 / 16 + 2) + 30`.
///
/// Scales gently with core count and never drops below 40. Saturates at the
/// largest int-typed configuration value instead of overflowing.
#[must_use]
pub fn default_num_threads(processors: usize) -> u32 {
    let scaled = processors.saturating_mul(17) / 16;
    let threads = scaled.saturating_add(2).max(10).saturating_add(30);
    let cap = u32::try_from(INT_MAX).unwrap_or(u32::MAX);
    u32::try_from(threads).map_or(cap, |t| t.min(cap))
}
