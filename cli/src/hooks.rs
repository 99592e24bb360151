//! Hooks requested on the command line

use std::collections::BTreeMap;

use synacor_vm::constants::{Address, Word};
use synacor_vm::runtime::{Computer, Hooks, Reg};
use tracing::{info, warn};

use crate::parse::{self, ParseError};

/// A single action to perform when `%pc` reaches an address
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookSpec {
    /// Overwrite memory starting at the hook address
    Patch { address: Address, words: Vec<Word> },

    /// Set a register
    Force {
        address: Address,
        reg: Reg,
        value: Word,
    },
}

impl HookSpec {
    pub fn parse_patch(input: &str) -> Result<Self, ParseError> {
        let (address, words) = parse::finish_patch(input)?;
        Ok(Self::Patch { address, words })
    }

    pub fn parse_force(input: &str) -> Result<Self, ParseError> {
        let (address, (reg, value)) = parse::finish_force(input)?;
        Ok(Self::Force {
            address,
            reg,
            value,
        })
    }

    #[must_use]
    pub const fn address(&self) -> Address {
        match self {
            Self::Patch { address, .. } | Self::Force { address, .. } => *address,
        }
    }

    fn apply(&self, computer: &mut Computer) {
        match self {
            Self::Patch { address, words } => {
                if let Err(e) = computer.memory.write_slice(*address, words) {
                    warn!(address, error = %e, "Could not patch memory");
                }
            }
            Self::Force { reg, value, .. } => computer.registers.set(*reg, *value),
        }
    }
}

/// Build the hook table. Specs sharing an address run in the order given.
pub fn build(specs: Vec<HookSpec>) -> Hooks<'static> {
    let mut by_address: BTreeMap<Address, Vec<HookSpec>> = BTreeMap::new();
    for spec in specs {
        by_address.entry(spec.address()).or_default().push(spec);
    }

    let mut hooks = Hooks::new();
    for (address, specs) in by_address {
        info!(address, count = specs.len(), "Registering hook");
        hooks.insert(address, move |computer: &mut Computer| {
            for spec in &specs {
                spec.apply(computer);
            }
        });
    }
    hooks
}
