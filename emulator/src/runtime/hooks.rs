//! Address-keyed callbacks run before an instruction is fetched

use std::collections::BTreeMap;

use tracing::debug;

use super::Computer;
use crate::constants::Address;

type Hook<'a> = Box<dyn FnMut(&mut Computer) + 'a>;

/// A table of hooks, owned by the caller and handed to
/// [`Computer::step`]/[`Computer::run`].
///
/// Each time the instruction pointer reaches an address with a hook, the
/// hook runs with full access to the computer, before the instruction at
/// that address is fetched. It may patch memory, registers, the stack or
/// the instruction pointer itself.
#[derive(Default)]
pub struct Hooks<'a> {
    table: BTreeMap<Address, Hook<'a>>,
}

impl<'a> Hooks<'a> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook, builder-style
    #[must_use]
    pub fn on(mut self, address: Address, hook: impl FnMut(&mut Computer) + 'a) -> Self {
        self.insert(address, hook);
        self
    }

    /// Register a hook, replacing the one previously set at this address
    pub fn insert(&mut self, address: Address, hook: impl FnMut(&mut Computer) + 'a) {
        self.table.insert(address, Box::new(hook));
    }

    #[must_use]
    pub fn contains(&self, address: Address) -> bool {
        self.table.contains_key(&address)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Addresses with a hook, in increasing order
    pub fn addresses(&self) -> impl Iterator<Item = Address> + '_ {
        self.table.keys().copied()
    }

    /// Run the hook at the current instruction pointer, if any.
    /// Returns whether a hook ran.
    pub(crate) fn fire(&mut self, computer: &mut Computer) -> bool {
        let address = computer.pc;
        if let Some(hook) = self.table.get_mut(&address) {
            debug!(address, "Running hook");
            hook(computer);
            true
        } else {
            false
        }
    }
}

impl std::fmt::Debug for Hooks<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.table.keys()).finish()
    }
}
