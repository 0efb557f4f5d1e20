use super::{ComposableCatalog, ExportDefinition};

/// Extension methods for narrowing the exports of a catalog.
///
/// Parts left without any export are dropped; they are no longer parts.
pub trait ExportFilter {
    /// Keep exports whose contract name satisfies the predicate.
    fn filter_exports(&self, f: impl Fn(&str) -> bool) -> ComposableCatalog;

    /// Keep only exports whose contracts are in `allow`.
    fn exposing(&self, allow: &[&str]) -> ComposableCatalog {
        self.filter_exports(|name| allow.contains(&name))
    }

    /// Remove exports whose contracts are in `deny`; keep everything else.
    fn hiding(&self, deny: &[&str]) -> ComposableCatalog {
        self.filter_exports(|name| !deny.contains(&name))
    }
}

impl ExportFilter for ComposableCatalog {
    fn filter_exports(&self, f: impl Fn(&str) -> bool) -> ComposableCatalog {
        let parts = self.parts().iter().filter_map(|part| {
            let exports: Vec<ExportDefinition> = part
                .exports()
                .iter()
                .filter(|export| f(export.contract_name()))
                .cloned()
                .collect();

            (!exports.is_empty()).then(|| part.with_exports(exports))
        });

        ComposableCatalog::create(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ComposablePartDefinition, SharingPolicy};
    use crate::metadata::Metadata;
    use crate::reflection::{AssemblyName, TypeRef, FIRST_TYPE_TOKEN};

    fn catalog() -> ComposableCatalog {
        let assembly = AssemblyName::new("Filters", "1.0.0");
        let part = |token: u32, contracts: &[&str]| {
            ComposablePartDefinition::new(
                TypeRef::new(assembly.clone(), token, format!("P{token}")),
                contracts
                    .iter()
                    .map(|c| ExportDefinition::new(*c, Metadata::new()))
                    .collect(),
                Vec::new(),
                SharingPolicy::Shared,
            )
        };
        ComposableCatalog::create([
            part(FIRST_TYPE_TOKEN, &["logger", "sink"]),
            part(FIRST_TYPE_TOKEN + 1, &["sink"]),
        ])
    }

    #[test]
    fn exposing_drops_parts_without_exports() {
        let filtered = catalog().exposing(&["logger"]);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.parts()[0].exports().len(), 1);
        assert_eq!(filtered.parts()[0].exports()[0].contract_name(), "logger");
    }

    #[test]
    fn hiding_keeps_everything_else() {
        let filtered = catalog().hiding(&["logger"]);
        assert_eq!(filtered.len(), 2);
        assert!(filtered
            .parts()
            .iter()
            .all(|p| p.exports().iter().all(|e| e.contract_name() == "sink")));
    }
}
