#![no_main]

use ferrous_ioc::{bean, DestroyCallback, RegistryError, SingletonRegistry};
use libfuzzer_sys::fuzz_target;
use std::sync::Arc;

const NAMES: [&str; 4] = ["a", "b", "c", "d"];

fuzz_target!(|data: &[u8]| {
    let registry = SingletonRegistry::new();

    for chunk in data.chunks(2) {
        let op = chunk[0] % 8;
        let name = NAMES[(chunk.get(1).copied().unwrap_or(0) as usize) % NAMES.len()];

        match op {
            0 => {
                let existed = registry.contains_singleton(name);
                let result = registry.register_singleton(name, bean(op));
                assert_eq!(result.is_err(), existed);
            }
            1 => {
                let before = registry.get_singleton(name);
                let instance = registry.get_or_create_singleton(name, || Ok(bean(name))).unwrap();
                if let Some(before) = before {
                    assert!(Arc::ptr_eq(&before, &instance));
                }
            }
            2 => {
                let result = registry.get_or_create_singleton(name, || Err(RegistryError::NotFound("dep".into())));
                assert_eq!(result.is_ok(), registry.contains_singleton(name));
            }
            3 => registry.add_singleton_factory(name, move || bean(name)),
            4 => registry.remove_singleton(name),
            5 => registry.register_disposable_bean(name, Arc::new(DestroyCallback::new(|| Ok(())))),
            6 => registry.destroy_singleton(name),
            _ => registry.destroy_singletons(),
        }

        // Nothing stays in creation between calls
        assert!(registry.singletons_in_creation().is_empty());
        for n in NAMES {
            // A pending factory is never exposed outside of creation
            if !registry.contains_singleton(n) {
                assert!(registry.get_singleton(n).is_none());
            }
        }
    }
});
