use facility_overrides::{
    AssemblyDescriptor, AssemblyIdentity, CodedError, DebugModeStore, FacilityId,
    FacilityOverrideStore, LoadOverrides, Result, SourceFormat, Version,
};

const FACILITY_XML: &str = r#"<facilities>
  <facility assemblyName="Acme.Widgets" identifier="42" />
  <facility assemblyName="Acme.Widgets, Version=2.0" identifier="43" />
  <facility identifier="1" />
</facilities>"#;

const DEBUG_JSON: &str = r#"{ "debugModes": [
  { "assemblyName": "Acme.Widgets", "isEnabled": true }
] }"#;

fn main() -> Result<()> {
    println!("--- Basic Usage Example ---\n");

    // 1. Populate the process-wide stores at startup
    let facilities = FacilityOverrideStore::global();
    let debug_modes = DebugModeStore::global();

    let subscription = facilities.subscribe(|| println!("   (facility overrides changed)"))?;
    facilities.load_str(FACILITY_XML, SourceFormat::Xml)?;
    debug_modes.load_str(DEBUG_JSON, SourceFormat::Json)?;
    facilities.unsubscribe(subscription)?;

    println!("1. Loaded {} facility overrides:", facilities.len()?);
    for entry in facilities.entries()? {
        let label = if entry.descriptor.is_wildcard() {
            "<any assembly>".to_string()
        } else {
            entry.descriptor.to_string()
        };
        println!("   {:<32} -> {}", label, entry.value);
    }

    // 2. Resolve errors for concrete assemblies
    let widgets_v1 = AssemblyIdentity::new("Acme.Widgets", Version::new(1, 4, 0, 0));
    let widgets_v2 = AssemblyIdentity::new("Acme.Widgets", Version::new(2, 0, 3, 0));
    let other = AssemblyIdentity::new("Other.Lib", Version::new(1, 0, 0, 0));

    println!("\n2. Resolved errors:");
    for identity in [&widgets_v1, &widgets_v2, &other] {
        let err = CodedError::resolve(identity, 7, "widget not found", FacilityId::new(0))
            .with_detail("shelf=B row=12");
        println!("   {:<12} {}", identity.name(), err);
    }

    // 3. The internal log always carries the detail
    let err = CodedError::resolve(&other, 7, "widget not found", FacilityId::new(0))
        .with_detail("shelf=B row=12");
    println!("\n3. Internal log line:");
    println!("   {}", err.diagnostic_log());
    err.diagnostic_log().emit();

    // 4. Batched edits notify observers once
    let local = DebugModeStore::new();
    local.subscribe(|| println!("   (debug modes changed)"))?;
    println!("\n4. Batched edits:");
    {
        let _batch = local.batch()?;
        local.add(AssemblyDescriptor::named("Acme.Widgets"), true)?;
        local.add("Acme.Gadgets, Culture=neutral".parse()?, false)?;
        local.add(AssemblyDescriptor::any(), false)?;
    }
    println!("   {} entries", local.len()?);

    Ok(())
}
