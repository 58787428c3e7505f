#![no_main]

use facility_overrides::{AssemblyDescriptor, FacilityId, FacilityOverrideStore, LoadOverrides, SourceFormat};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let store = FacilityOverrideStore::new();
    store.add(AssemblyDescriptor::any(), FacilityId::new(1)).unwrap();

    // A rejected document must leave the store untouched
    if store.load_bytes(data, SourceFormat::Xml).is_err() {
        assert_eq!(store.len().unwrap(), 1);
    }
});
