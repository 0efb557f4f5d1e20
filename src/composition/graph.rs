use std::collections::HashMap;

use crate::catalog::{ComposableCatalog, ComposablePartDefinition, ImportDefinition};
use crate::config::CompositionConfig;

use super::{
    CompositionDiagnostic, CompositionPlan, DiagnosticKind, ExportRef, ImportPlan, PartPlan,
};

pub(super) struct Resolution {
    pub plan: CompositionPlan,
    pub diagnostics: Vec<CompositionDiagnostic>,
}

/// Resolve every import of every part against the catalog's exports.
///
/// Rejection runs to a fixpoint in three stages per round:
/// 1. parts with an import nobody exports, repeated until stable (removing
///    exporters can only create more such parts);
/// 2. parts with an ambiguous import or an unusable preferred exporter,
///    judged against the set left by stage 1;
/// 3. parts on a cycle of construction (non-lazy) imports.
///
/// A round that rejects anything starts over from stage 1.
pub(super) fn resolve(catalog: &ComposableCatalog, config: &CompositionConfig) -> Resolution {
    let parts = catalog.parts();
    let mut alive = vec![true; parts.len()];
    let mut diagnostics = Vec::new();

    loop {
        while reject(parts, &mut alive, &mut diagnostics, |kind| {
            matches!(kind, DiagnosticKind::UnsatisfiedImport { .. })
        }) {}

        if reject(parts, &mut alive, &mut diagnostics, |_| true) {
            continue;
        }

        let cycles = find_cycles(parts, &alive, config.allow_lazy_cycles);
        if cycles.is_empty() {
            break;
        }

        for cycle in cycles {
            let types: Vec<_> = cycle.iter().map(|&i| parts[i].type_ref().clone()).collect();
            for &i in &cycle {
                alive[i] = false;
                diagnostics.push(CompositionDiagnostic {
                    part: parts[i].type_ref().clone(),
                    kind: DiagnosticKind::CyclicDependency { cycle: types.clone() },
                });
            }
        }
    }

    Resolution {
        plan: build_plan(parts, &alive),
        diagnostics,
    }
}

/// Exporters per contract among live parts, indexed into `parts`.
fn index_exports(
    parts: &[ComposablePartDefinition],
    alive: &[bool],
) -> HashMap<String, Vec<ExportRef>> {
    let mut exporters: HashMap<String, Vec<ExportRef>> = HashMap::new();
    for (part, definition) in parts.iter().enumerate().filter(|(i, _)| alive[*i]) {
        for (export, definition) in definition.exports().iter().enumerate() {
            exporters
                .entry(definition.contract_name().to_string())
                .or_default()
                .push(ExportRef { part, export });
        }
    }
    exporters
}

/// Pick the exports that satisfy `import` from `candidates`.
fn satisfy(
    parts: &[ComposablePartDefinition],
    import: &ImportDefinition,
    candidates: &[ExportRef],
) -> Result<Vec<ExportRef>, DiagnosticKind> {
    let contract = import.contract_name().to_string();

    if import.cardinality().allows_many() {
        return Ok(candidates.to_vec());
    }

    match (candidates, import.preferred_exporter()) {
        ([], _) if import.cardinality().is_required() => {
            Err(DiagnosticKind::UnsatisfiedImport { contract })
        }
        ([], _) => Ok(Vec::new()),
        (_, Some(hint)) => candidates
            .iter()
            .find(|c| parts[c.part].type_ref() == hint)
            .map(|c| vec![*c])
            .ok_or_else(|| DiagnosticKind::ImportHintInvalid {
                contract,
                hint: hint.clone(),
            }),
        ([single], None) => Ok(vec![*single]),
        (_, None) => Err(DiagnosticKind::AmbiguousImport {
            contract,
            candidates: candidates
                .iter()
                .map(|c| parts[c.part].type_ref().clone())
                .collect(),
        }),
    }
}

/// One pass over live parts against a single export snapshot. Returns
/// whether any part was rejected.
fn reject(
    parts: &[ComposablePartDefinition],
    alive: &mut [bool],
    diagnostics: &mut Vec<CompositionDiagnostic>,
    applies: impl Fn(&DiagnosticKind) -> bool,
) -> bool {
    let exporters = index_exports(parts, alive);
    let mut rejected = Vec::new();

    for (i, part) in parts.iter().enumerate().filter(|(i, _)| alive[*i]) {
        let failure = part.imports().iter().find_map(|import| {
            let candidates = exporters
                .get(import.contract_name())
                .map(Vec::as_slice)
                .unwrap_or_default();
            satisfy(parts, import, candidates).err().filter(|kind| applies(kind))
        });

        if let Some(kind) = failure {
            rejected.push(i);
            diagnostics.push(CompositionDiagnostic {
                part: part.type_ref().clone(),
                kind,
            });
        }
    }

    for &i in &rejected {
        alive[i] = false;
    }
    !rejected.is_empty()
}

/// Strongly connected components of the construction graph that form a
/// cycle (more than one part, or a part importing itself).
fn find_cycles(
    parts: &[ComposablePartDefinition],
    alive: &[bool],
    allow_lazy_cycles: bool,
) -> Vec<Vec<usize>> {
    let exporters = index_exports(parts, alive);
    let mut edges: Vec<Vec<usize>> = vec![Vec::new(); parts.len()];

    for (i, part) in parts.iter().enumerate().filter(|(i, _)| alive[*i]) {
        for import in part.imports() {
            if import.is_lazy() && allow_lazy_cycles {
                continue;
            }
            let candidates = exporters
                .get(import.contract_name())
                .map(Vec::as_slice)
                .unwrap_or_default();
            if let Ok(selected) = satisfy(parts, import, candidates) {
                edges[i].extend(selected.iter().map(|export| export.part));
            }
        }
        edges[i].sort_unstable();
        edges[i].dedup();
    }

    let mut tarjan = Tarjan::new(parts.len());
    for i in (0..parts.len()).filter(|&i| alive[i]) {
        if tarjan.index[i].is_none() {
            tarjan.visit(i, &edges);
        }
    }

    tarjan
        .components
        .into_iter()
        .filter(|component| component.len() > 1 || edges[component[0]].contains(&component[0]))
        .collect()
}

struct Tarjan {
    next: usize,
    index: Vec<Option<usize>>,
    low: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<usize>,
    components: Vec<Vec<usize>>,
}

impl Tarjan {
    fn new(n: usize) -> Self {
        Self {
            next: 0,
            index: vec![None; n],
            low: vec![0; n],
            on_stack: vec![false; n],
            stack: Vec::new(),
            components: Vec::new(),
        }
    }

    fn open(&mut self, v: usize) {
        self.index[v] = Some(self.next);
        self.low[v] = self.next;
        self.next += 1;
        self.stack.push(v);
        self.on_stack[v] = true;
    }

    fn visit(&mut self, root: usize, edges: &[Vec<usize>]) {
        self.open(root);
        // (vertex, next outgoing edge)
        let mut work = vec![(root, 0usize)];

        while let Some((v, next)) = work.last().copied() {
            if let Some(&w) = edges[v].get(next) {
                if let Some(top) = work.last_mut() {
                    top.1 += 1;
                }
                match self.index[w] {
                    None => {
                        self.open(w);
                        work.push((w, 0));
                    }
                    Some(index) if self.on_stack[w] => {
                        self.low[v] = self.low[v].min(index);
                    }
                    Some(_) => {}
                }
                continue;
            }

            work.pop();
            if let Some(&(parent, _)) = work.last() {
                self.low[parent] = self.low[parent].min(self.low[v]);
            }

            if Some(self.low[v]) == self.index[v] {
                let mut component = Vec::new();
                while let Some(w) = self.stack.pop() {
                    self.on_stack[w] = false;
                    component.push(w);
                    if w == v {
                        break;
                    }
                }
                component.reverse();
                self.components.push(component);
            }
        }
    }
}

fn build_plan(parts: &[ComposablePartDefinition], alive: &[bool]) -> CompositionPlan {
    // Re-index surviving parts densely.
    let survivors: Vec<usize> = (0..parts.len()).filter(|&i| alive[i]).collect();
    let remap: HashMap<usize, usize> = survivors
        .iter()
        .enumerate()
        .map(|(new, &old)| (old, new))
        .collect();
    let exporters = index_exports(parts, alive);
    let relocate = |export: &ExportRef| ExportRef {
        part: remap[&export.part],
        export: export.export,
    };

    let plan_parts = survivors
        .iter()
        .map(|&i| {
            let imports = parts[i]
                .imports()
                .iter()
                .map(|import| {
                    let candidates = exporters
                        .get(import.contract_name())
                        .map(Vec::as_slice)
                        .unwrap_or_default();
                    let exports = satisfy(parts, import, candidates)
                        .unwrap_or_default()
                        .iter()
                        .map(relocate)
                        .collect();
                    ImportPlan {
                        definition: import.clone(),
                        exports,
                    }
                })
                .collect();
            PartPlan {
                definition: parts[i].clone(),
                imports,
            }
        })
        .collect();

    let exports_by_contract = exporters
        .into_iter()
        .map(|(contract, exports)| (contract, exports.iter().map(relocate).collect()))
        .collect();

    CompositionPlan {
        parts: plan_parts,
        exports_by_contract,
    }
}
