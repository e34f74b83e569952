pub mod json_store;
mod memory;
mod state;

pub use json_store::JsonStore;
pub use memory::MemoryStore;
pub use state::EngineState;

use crate::error::EngineResult;

/// The transactional datastore the engine runs against.
///
/// `transact` hands the closure a working copy of the state under the store's
/// exclusive lock and commits it only when the closure returns `Ok`. An `Err`
/// leaves the stored state untouched, so multi-step transitions such as a
/// plan reset either land completely or not at all.
pub trait Store: Send + Sync {
    fn read<T>(&self, f: impl FnOnce(&EngineState) -> T) -> EngineResult<T>;

    fn transact<T>(
        &self,
        f: impl FnOnce(&mut EngineState) -> EngineResult<T>,
    ) -> EngineResult<T>;
}
