#![no_main]

use facility_overrides::{AssemblyDescriptor, AssemblyIdentity, Version};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    let Ok(descriptor) = AssemblyDescriptor::parse(data) else {
        return;
    };

    // Anything that parses must render to something that parses back equal
    let rendered = descriptor.to_string();
    if !rendered.is_empty() {
        let reparsed = AssemblyDescriptor::parse(&rendered).expect("rendered descriptor must parse");
        assert_eq!(reparsed, descriptor);
    }

    let identity = AssemblyIdentity::new(data, Version::new(1, 0, 0, 0));
    let score = descriptor.match_score(&identity);
    assert!((-4..=15).contains(&score));
});
