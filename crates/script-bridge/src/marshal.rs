//! Boundary marshaling
//!
//! Orders reach scripts as handles into an [`OrderTable`] that holds the
//! script's own copy for the duration of one callback. Text is copied in and
//! out of guest linear memory; nothing aliases native storage.

use std::collections::HashMap;

use strategy_host_core::{Order, StrategyError, StrategyResult};
use wasmtime::{Caller, Extern, Memory};

use crate::runtime::HostState;

/// Name of the linear memory every script must export
pub const MEMORY_EXPORT: &str = "memory";

/// Orders currently lent to scripts, keyed by handle
#[derive(Debug)]
pub(crate) struct OrderTable {
    entries: HashMap<i32, Order>,
    next_handle: i32,
}

impl Default for OrderTable {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            next_handle: 1,
        }
    }
}

impl OrderTable {
    /// Stores a copy of `order` and returns its handle; handles are never 0
    pub(crate) fn insert(&mut self, order: Order) -> i32 {
        let handle = self.next_handle;
        self.next_handle = match self.next_handle.checked_add(1) {
            Some(next) => next,
            None => 1,
        };
        self.entries.insert(handle, order);
        handle
    }

    pub(crate) fn get(&self, handle: i32) -> StrategyResult<&Order> {
        self.entries
            .get(&handle)
            .ok_or_else(|| stale_handle(handle))
    }

    pub(crate) fn get_mut(&mut self, handle: i32) -> StrategyResult<&mut Order> {
        self.entries
            .get_mut(&handle)
            .ok_or_else(|| stale_handle(handle))
    }

    pub(crate) fn remove(&mut self, handle: i32) -> Option<Order> {
        self.entries.remove(&handle)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

fn stale_handle(handle: i32) -> StrategyError {
    StrategyError::Marshal(format!("order handle {handle} is not live"))
}

fn guest_memory(caller: &mut Caller<'_, HostState>) -> StrategyResult<Memory> {
    caller
        .get_export(MEMORY_EXPORT)
        .and_then(Extern::into_memory)
        .ok_or_else(|| StrategyError::Marshal(format!("script does not export `{MEMORY_EXPORT}`")))
}

fn offset(value: i32, what: &str) -> StrategyResult<usize> {
    usize::try_from(value)
        .map_err(|_| StrategyError::Marshal(format!("negative {what} {value}")))
}

/// Copies `len` bytes at `ptr` out of guest memory as UTF-8 text
pub(crate) fn read_string(
    caller: &mut Caller<'_, HostState>,
    ptr: i32,
    len: i32,
) -> StrategyResult<String> {
    let memory = guest_memory(caller)?;
    let mut bytes = vec![0u8; offset(len, "length")?];
    memory
        .read(&*caller, offset(ptr, "pointer")?, &mut bytes)
        .map_err(|err| StrategyError::Marshal(format!("text at {ptr}+{len}: {err}")))?;
    String::from_utf8(bytes)
        .map_err(|_| StrategyError::Marshal(format!("text at {ptr}+{len} is not valid UTF-8")))
}

/// Copies at most `cap` bytes of `bytes` into guest memory at `ptr` and
/// returns the full length, so scripts can detect truncation
pub(crate) fn write_bytes(
    caller: &mut Caller<'_, HostState>,
    ptr: i32,
    cap: i32,
    bytes: &[u8],
) -> StrategyResult<i32> {
    let memory = guest_memory(caller)?;
    let cap = offset(cap, "capacity")?;
    let copied = &bytes[..bytes.len().min(cap)];
    memory
        .write(&mut *caller, offset(ptr, "pointer")?, copied)
        .map_err(|err| StrategyError::Marshal(format!("buffer at {ptr}+{cap}: {err}")))?;
    i32::try_from(bytes.len())
        .map_err(|_| StrategyError::Marshal("text longer than i32::MAX".into()))
}
