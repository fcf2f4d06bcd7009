#![no_main]

use ferrous_ioc::{BoxError, DestroyCallback, SingletonRegistry};
use libfuzzer_sys::fuzz_target;
use std::sync::{Arc, Mutex};

const NAMES: [&str; 8] = ["a", "b", "c", "d", "e", "f", "g", "h"];

fuzz_target!(|data: &[u8]| {
    let registry = SingletonRegistry::new();
    let destroyed = Arc::new(Mutex::new(Vec::new()));

    for name in NAMES {
        let destroyed = destroyed.clone();
        registry.register_disposable_bean(
            name,
            Arc::new(DestroyCallback::new(move || -> Result<(), BoxError> {
                destroyed.lock().unwrap().push(name);
                Ok(())
            })),
        );
    }

    for pair in data.chunks_exact(2) {
        let name = NAMES[pair[0] as usize % NAMES.len()];
        let other = NAMES[pair[1] as usize % NAMES.len()];
        if pair[0] & 0x80 == 0 {
            registry.register_dependent_bean(name, other);
        } else {
            registry.register_contained_bean(name, other);
        }
    }

    for name in NAMES {
        for dependent in registry.get_dependent_beans(name) {
            assert!(registry.get_dependencies_for_bean(&dependent).iter().any(|d| d == name));
            assert!(registry.is_dependent(name, &dependent));
        }
    }

    registry.destroy_singletons();

    let mut order = destroyed.lock().unwrap().clone();
    order.sort();
    assert_eq!(order, NAMES.to_vec());
    for name in NAMES {
        assert!(!registry.has_dependent_bean(name));
    }
});
