use std::collections::BTreeSet;

use part_composer::{
    Assembly, AssemblyName, AttributedPartDiscovery, ComposableCatalog, CompositionError,
    PartDeclaration, PartDiscovery, Resolver,
};

struct NonExportingType;

struct ExportingType;

fn test_assembly() -> Assembly {
    Assembly::builder("CompositionCatalogTests", "1.0.0")
        .add_type::<NonExportingType>()
        .add_part::<ExportingType>(PartDeclaration::new(|_| Ok(ExportingType)).export())
        .build()
}

#[tokio::test]
async fn create_from_types_omits_non_parts() {
    let assembly = test_assembly();
    let types = vec![
        assembly.get_type::<NonExportingType>().unwrap().clone(),
        assembly.get_type::<ExportingType>().unwrap().clone(),
    ];

    let parts = AttributedPartDiscovery::new()
        .create_parts(&types)
        .await
        .unwrap();
    let catalog = ComposableCatalog::create(parts);

    assert_eq!(catalog.len(), 1);
    assert_eq!(
        catalog.parts()[0].type_ref(),
        &assembly.get_type::<ExportingType>().unwrap().type_ref()
    );
}

#[tokio::test]
async fn create_from_assemblies_loads_and_discovers() {
    let resolver = Resolver::new();
    let name = AssemblyName::new("CompositionCatalogTests", "1.0.0");
    resolver.register(name.clone(), test_assembly);

    let parts = AttributedPartDiscovery
        .create_parts_from_assemblies(&resolver, std::slice::from_ref(&name))
        .await
        .unwrap();

    assert_eq!(parts.len(), 1);
    assert_eq!(resolver.load_count(), 1);
}

#[tokio::test]
async fn create_from_unknown_assembly_fails() {
    let resolver = Resolver::new();
    let missing = [AssemblyName::new("Missing", "0.0.1")];

    let result = AttributedPartDiscovery
        .create_parts_from_assemblies(&resolver, &missing)
        .await;
    assert!(matches!(result, Err(CompositionError::AssemblyNotFound(_))));
}

#[test]
fn with_part_null_throws() {
    let catalog = ComposableCatalog::create([]);
    assert!(matches!(
        catalog.with_part(None),
        Err(CompositionError::ArgumentNull(_))
    ));
}

#[test]
fn get_assembly_inputs_empty() {
    let catalog = ComposableCatalog::create([]);
    assert_eq!(catalog.get_input_assemblies().len(), 0);
}

#[tokio::test]
async fn get_assembly_inputs() {
    let assembly = test_assembly();
    let parts = AttributedPartDiscovery
        .create_parts(assembly.types())
        .await
        .unwrap();
    let catalog = ComposableCatalog::create(parts);

    let expected: BTreeSet<AssemblyName> = [assembly.name().clone()].into_iter().collect();
    assert_eq!(catalog.get_input_assemblies(), expected);
}

#[tokio::test]
async fn building_a_catalog_does_not_load_assemblies() {
    let resolver = Resolver::new();
    let name = AssemblyName::new("CompositionCatalogTests", "1.0.0");
    resolver.register(name.clone(), test_assembly);

    // Discover from a separately built copy; the registered one stays unloaded.
    let parts = AttributedPartDiscovery
        .create_parts(test_assembly().types())
        .await
        .unwrap();
    let catalog = ComposableCatalog::create(parts);
    let _ = catalog.get_input_assemblies();

    assert!(!resolver.is_loaded(&name));
    assert_eq!(resolver.load_count(), 0);
}
