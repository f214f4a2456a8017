/// Buffer value types shared between the façade and the command-buffer layer.

use crate::device::BufferHandle;
use crate::range::BufferRange;

/// How often the caller intends to rewrite a buffer's contents.
///
/// Declared at construction; decides storage placement and whether a lock
/// manager is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateFrequency {
    /// Write-mostly/static data: device-local, driver-owned storage,
    /// writes become GPU-side uploads, no CPU mapping, no lock manager
    Once,
    /// Rewritten every frame: persistently mapped, CPU-writable
    Often,
    /// Rewritten now and then: persistently mapped, CPU-writable
    Occasional,
}

/// What a buffer access did to a range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockKind {
    /// Bytes were read
    Read,
    /// Bytes were written or cleared
    Write,
}

/// Description of the bytes a write/read call touched.
///
/// Returned from every buffer access; the command-buffer layer passes it
/// back (with a sync object) once the corresponding GPU command is
/// actually submitted, turning it into an active range guard.
#[derive(Debug, Clone, Copy)]
pub struct BufferLock {
    /// Access direction
    pub kind: LockKind,
    /// Touched byte window, relative to the buffer's start
    pub range: BufferRange,
    /// Backing buffer of the touched bytes
    pub buffer: BufferHandle,
}
