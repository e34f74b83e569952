use crate::error::EngineResult;
use crate::storage::{EngineState, Store};
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<EngineState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: EngineState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn snapshot(&self) -> EngineState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Store for MemoryStore {
    fn read<T>(&self, f: impl FnOnce(&EngineState) -> T) -> EngineResult<T> {
        let guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(f(&guard))
    }

    fn transact<T>(
        &self,
        f: impl FnOnce(&mut EngineState) -> EngineResult<T>,
    ) -> EngineResult<T> {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let mut working = guard.clone();
        let value = f(&mut working)?;
        *guard = working;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryStore;
    use crate::error::EngineError;
    use crate::storage::Store;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn failed_transaction_leaves_state_untouched() {
        let store = MemoryStore::new();

        let result: Result<(), EngineError> = store.transact(|state| {
            state.profile_mut("user-1");
            Err(EngineError::generation_failed("planner offline"))
        });

        assert!(result.is_err());
        assert!(store.snapshot().profiles.is_empty());
    }

    #[test]
    fn transactions_serialize_across_threads() {
        let store = Arc::new(MemoryStore::new());
        let handles: Vec<_> = (0..8)
            .map(|index| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    store
                        .transact(|state| {
                            state.profile_mut(&format!("user-{index}"));
                            Ok(())
                        })
                        .unwrap();
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.snapshot().profiles.len(), 8);
    }
}
