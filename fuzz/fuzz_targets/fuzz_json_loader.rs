#![no_main]

use facility_overrides::{AssemblyDescriptor, DebugModeStore, LoadOverrides, SourceFormat};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let store = DebugModeStore::new();
    store.add(AssemblyDescriptor::named("Seed"), false).unwrap();

    if store.load_bytes(data, SourceFormat::Json).is_err() {
        assert_eq!(store.len().unwrap(), 1);
        assert!(!store.entries().unwrap()[0].value);
    }
});
