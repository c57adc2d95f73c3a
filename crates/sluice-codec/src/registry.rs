use std::any::{type_name, TypeId};
use std::collections::HashMap;

use tracing::debug;

use crate::error::{CodecError, CodecResult};

/// A registered contract: stable wire name plus the Rust type it names.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Contract {
    pub name: String,
    pub type_name: &'static str,
}

/// Explicit mapping from payload types to stable contract names.
///
/// Types are keyed by [`TypeId`], so lookups never rely on reflection or on
/// the unstable text of [`std::any::type_name`]. The mapping is a bijection:
/// a type has at most one name and a name belongs to at most one type.
#[derive(Clone, Debug, Default)]
pub struct ContractRegistry {
    by_type: HashMap<TypeId, Contract>,
    by_name: HashMap<String, TypeId>,
}

impl ContractRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `T` to `name`.
    pub fn register<T: 'static>(&mut self, name: impl Into<String>) -> CodecResult<()> {
        let name = name.into();
        let type_name = type_name::<T>();
        if name.is_empty() {
            return Err(CodecError::EmptyContract { type_name });
        }
        if let Some(existing) = self.by_type.get(&TypeId::of::<T>()) {
            return Err(CodecError::DuplicateType {
                type_name,
                existing: existing.name.clone(),
            });
        }
        if let Some(existing) = self.by_name.get(&name) {
            let existing = self
                .by_type
                .get(existing)
                .map(|c| c.type_name)
                .unwrap_or("<unknown>");
            return Err(CodecError::DuplicateContract { name, existing });
        }

        debug!(contract = %name, type_name, "registered contract");
        self.by_name.insert(name.clone(), TypeId::of::<T>());
        self.by_type
            .insert(TypeId::of::<T>(), Contract { name, type_name });
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    pub fn with<T: 'static>(mut self, name: impl Into<String>) -> CodecResult<Self> {
        self.register::<T>(name)?;
        Ok(self)
    }

    /// Contract name of `T`, if registered.
    pub fn contract_name_of<T: 'static>(&self) -> Option<&str> {
        self.contract_name(TypeId::of::<T>())
    }

    /// Contract name for a runtime type id, if registered.
    pub fn contract_name(&self, type_id: TypeId) -> Option<&str> {
        self.by_type.get(&type_id).map(|c| c.name.as_str())
    }

    /// Rust type name bound to a contract name, if any.
    pub fn type_name_for(&self, contract: &str) -> Option<&'static str> {
        self.by_name
            .get(contract)
            .and_then(|id| self.by_type.get(id))
            .map(|c| c.type_name)
    }

    /// Returns `true` if `contract` is the name registered for `T`.
    pub fn is_contract_of<T: 'static>(&self, contract: &str) -> bool {
        self.by_name.get(contract) == Some(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }

    /// All registered contracts, sorted by name.
    pub fn contracts(&self) -> Vec<&Contract> {
        let mut all: Vec<&Contract> = self.by_type.values().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }
}
