//! Process-wide cache of model field maps.

use crate::fields::{collect_model_fields, Model, ModelFields};
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

/// Memoized per-type field maps.
///
/// Each entry is computed exactly once, on first use of the type; concurrent
/// first-time callers block until the winning caller finishes, and all later
/// lookups are cheap reads. Entries live until the registry is dropped
/// (for [`global`](Self::global), process exit).
///
/// Most callers use the shared [`global`](Self::global) registry through
/// [`Querier::new`](crate::Querier::new); tests and embedders that want
/// isolated ownership can construct their own.
#[derive(Default)]
pub struct ModelRegistry {
    entries: RwLock<HashMap<TypeId, Arc<OnceLock<Arc<ModelFields>>>>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared process-wide registry.
    pub fn global() -> &'static ModelRegistry {
        static GLOBAL: OnceLock<ModelRegistry> = OnceLock::new();
        GLOBAL.get_or_init(ModelRegistry::new)
    }

    /// Get (computing and caching on first use) the field map for `M`.
    ///
    /// Repeated calls return the identical cached map.
    pub fn get<M: Model>(&self) -> Arc<ModelFields> {
        let key = TypeId::of::<M>();

        let cell = {
            let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
            entries.get(&key).cloned()
        };
        let cell = match cell {
            Some(cell) => cell,
            None => {
                let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
                entries.entry(key).or_default().clone()
            }
        };

        // Initialization happens outside the map locks so other types stay
        // accessible while this one computes.
        cell.get_or_init(|| Arc::new(collect_model_fields::<M>()))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::SqlValue;
    use crate::fields::FieldCollector;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static COLLECT_CALLS: AtomicUsize = AtomicUsize::new(0);

    struct Counted;

    impl Model for Counted {
        fn table_name() -> &'static str {
            "counted"
        }
        fn collect_fields(c: &mut FieldCollector) {
            COLLECT_CALLS.fetch_add(1, Ordering::SeqCst);
            c.column("id", true);
        }
        fn field_value(&self, _name: &str) -> Option<SqlValue> {
            None
        }
        fn write_back(&mut self, _row: &tokio_postgres::Row) -> crate::DbResult<()> {
            Ok(())
        }
    }

    #[test]
    fn repeated_gets_return_the_same_map() {
        let registry = ModelRegistry::new();
        let a = registry.get::<crate::fields::tests::Group>();
        let b = registry.get::<crate::fields::tests::Group>();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn concurrent_first_calls_compute_once() {
        let registry = Arc::new(ModelRegistry::new());

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.get::<Counted>())
            })
            .collect();
        let maps: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(COLLECT_CALLS.load(Ordering::SeqCst), 1);
        for m in &maps[1..] {
            assert!(Arc::ptr_eq(&maps[0], m));
        }
    }

    #[test]
    fn registries_are_independent() {
        let a = ModelRegistry::new();
        let b = ModelRegistry::new();
        let ma = a.get::<crate::fields::tests::Group>();
        let mb = b.get::<crate::fields::tests::Group>();
        assert!(!Arc::ptr_eq(&ma, &mb));
        assert_eq!(ma.fields(), mb.fields());
    }
}
