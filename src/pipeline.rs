//! Generation pipeline.
//!
//! Headers are read in parallel (one provider per header) and merged back in header
//! order, so the graph, and everything derived from it, is the same on every run:
//!
//! 1. collect the provider trees into one graph
//! 2. qualify names and compute completeness
//! 3. filter
//! 4. discover template instantiations until nothing new appears
//! 5. re-qualify with the final alias table, filter again, resolve names
//! 6. classify parameters, plan and render one unit per header

use crate::ast::RawHeader;
use crate::classify;
use crate::collector::Collector;
use crate::diagnostics::{DiagnosticKind, Diagnostics, ExclusionReport};
use crate::emit::{EmitOptions, GeneratedUnit, Planner, render_aggregate, render_unit};
use crate::error::{GenerateError, GenerateResult, ProviderResult};
use crate::filter::FilterEngine;
use crate::filter::rules::Rules;
use crate::naming::NamingResolver;
use crate::parsing::ProviderFactory;
use crate::qualify;
use crate::template::{Instantiations, TemplateEngine};
use rayon::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Counters reported after a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationStats {
    pub headers: usize,
    pub declarations: usize,
    pub excluded: usize,
    pub instantiations: usize,
    pub instantiation_rounds: usize,
    pub buffers: usize,
}

/// Everything a run produces, before anything is written.
#[derive(Debug)]
pub struct Generation {
    pub units: Vec<GeneratedUnit>,
    /// Project stem and source of the aggregate unit.
    pub aggregate: Option<(String, String)>,
    pub diagnostics: Diagnostics,
    pub report: ExclusionReport,
    pub stats: GenerationStats,
}

impl Generation {
    /// Emission errors (ambiguous overloads) were reported.
    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }
}

pub struct Generator<'r> {
    rules: &'r Rules,
    options: EmitOptions,
    project: Option<String>,
}

impl<'r> Generator<'r> {
    pub fn new(rules: &'r Rules) -> Self {
        Self {
            rules,
            options: EmitOptions::default(),
            project: None,
        }
    }

    pub fn with_options(mut self, options: EmitOptions) -> Self {
        self.options = options;
        self
    }

    /// Also render an aggregate `Init_<Project>` unit.
    pub fn with_project(mut self, project: Option<String>) -> Self {
        self.project = project.filter(|p| !p.trim().is_empty());
        self
    }

    /// Read every header in parallel. The result keeps the input order; the first
    /// provider error aborts the run.
    pub fn read_headers(
        &self,
        factory: &ProviderFactory,
        headers: &[PathBuf],
    ) -> ProviderResult<Vec<RawHeader>> {
        headers
            .par_iter()
            .map(|path| {
                let mut provider = factory.create()?;
                debug!("[pipeline] {} reads {}", provider.name(), path.display());
                provider.provide(path)
            })
            .collect()
    }

    /// Read and generate in one step.
    pub fn run(&self, factory: &ProviderFactory, headers: &[PathBuf]) -> GenerateResult<Generation> {
        if headers.is_empty() {
            return Err(GenerateError::NoInput);
        }
        let raw = self.read_headers(factory, headers)?;
        Ok(self.generate(raw))
    }

    /// Generate binding units from already-read headers, given in include order.
    pub fn generate(&self, headers: Vec<RawHeader>) -> Generation {
        let rules = self.rules;
        let header_count = headers.len();

        let mut collector = Collector::new(rules);
        for header in headers {
            info!("[pipeline] collecting {}", header.path.display());
            collector.add_header(header);
        }
        let (mut graph, mut diagnostics) = collector.finish();

        qualify::annotate(&mut graph, rules);
        let filter = FilterEngine::new(rules);
        // Verdicts are recomputed below, once the instantiations exist.
        filter.run(&mut graph, &mut Diagnostics::new());

        let engine = TemplateEngine::new(rules);
        let mut registry = Instantiations::default();
        let mut rounds = 0;
        loop {
            let created = engine.step(&mut graph, &mut registry, &mut diagnostics);
            if created.is_empty() {
                break;
            }
            rounds += 1;
            qualify::annotate_ids(&mut graph, rules, created);
            if rounds >= rules.max_instantiation_rounds {
                warn!("[pipeline] template discovery stopped after {rounds} rounds");
                diagnostics.warn(
                    DiagnosticKind::InstantiationLimit,
                    None,
                    "templates",
                    format!("instantiation discovery stopped after {rounds} rounds"),
                );
                break;
            }
        }

        if !registry.is_empty() {
            qualify::annotate(&mut graph, rules);
        }
        let filter_stats = filter.run(&mut graph, &mut diagnostics);
        let naming = NamingResolver::new(rules)
            .with_overrides(registry.names().clone())
            .resolve(&mut graph, &mut diagnostics);
        let buffers = classify::classify_all(&mut graph, rules);

        let planner = Planner::new(&graph, &naming, &registry, rules, self.options.clone());
        let plans = planner.plan();
        let units: Vec<GeneratedUnit> = plans.iter().map(render_unit).collect();
        let aggregate = self.project.as_ref().map(|project| {
            (project.clone(), render_aggregate(project, &plans))
        });

        diagnostics.sort();
        let report = ExclusionReport::build(&graph, &diagnostics);
        let stats = GenerationStats {
            headers: header_count,
            declarations: graph.iter().count(),
            excluded: graph
                .iter()
                .filter(|d| !d.verdict.is_included())
                .count(),
            instantiations: registry.len(),
            instantiation_rounds: rounds,
            buffers,
        };
        info!(
            "[pipeline] {} units, {} declarations, {} excluded, {} instantiations",
            units.len(),
            stats.declarations,
            stats.excluded,
            stats.instantiations
        );
        debug!("[pipeline] filter verdicts: {:?}", filter_stats.counts);

        Generation {
            units,
            aggregate,
            diagnostics,
            report,
            stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{RawDecl, RawKind};
    use crate::config::InstantiationRequest;

    fn header(path: &str, decls: Vec<RawDecl>) -> RawHeader {
        RawHeader {
            path: path.into(),
            decls,
        }
    }

    fn rules() -> Rules {
        Rules {
            external_namespaces: vec!["std".to_string()],
            predicate_prefixes: vec!["is".to_string()],
            max_instantiation_rounds: 8,
            ..Rules::default()
        }
    }

    fn sample() -> Vec<RawHeader> {
        vec![
            header(
                "include/shapes.hpp",
                vec![RawDecl::new(RawKind::Namespace, "Shapes").with_children(vec![
                    RawDecl::new(RawKind::Class, "Circle").with_children(vec![
                        RawDecl::new(RawKind::Constructor, "Circle").with_param("radius", "double"),
                        RawDecl::new(RawKind::Method, "area").with_return("double").constant(),
                    ]),
                ])],
            ),
            header(
                "include/util.hpp",
                vec![RawDecl::new(RawKind::Function, "version").with_return("int")],
            ),
        ]
    }

    #[test]
    fn test_one_unit_per_header_in_order() {
        let rules = rules();
        let generation = Generator::new(&rules).generate(sample());
        let stems: Vec<&str> = generation.units.iter().map(|u| u.stem.as_str()).collect();
        assert_eq!(stems, vec!["shapes", "util"]);
        assert!(generation.units[0].cpp.contains("define_class_under<Shapes::Circle>"));
        assert!(generation.units[1].cpp.contains("define_global_function(\"version\""));
        assert!(generation.aggregate.is_none());
        assert_eq!(generation.stats.headers, 2);
        assert!(!generation.has_errors());
    }

    #[test]
    fn test_output_is_deterministic() {
        let rules = rules();
        let first = Generator::new(&rules).generate(sample());
        let second = Generator::new(&rules).generate(sample());
        let render = |g: &Generation| {
            g.units
                .iter()
                .map(|u| format!("{}{}", u.cpp, u.hpp))
                .collect::<String>()
        };
        assert_eq!(render(&first), render(&second));
    }

    #[test]
    fn test_project_aggregate() {
        let rules = rules();
        let generation = Generator::new(&rules)
            .with_project(Some("geometry".to_string()))
            .generate(sample());
        let (stem, source) = generation.aggregate.unwrap();
        assert_eq!(stem, "geometry");
        assert!(source.contains("Init_Geometry"));
        let shapes = source.find("Init_Shapes();").unwrap();
        let util = source.find("Init_Util();").unwrap();
        assert!(shapes < util);
    }

    #[test]
    fn test_instantiation_limit_is_reported() {
        // Each instantiation of Node<T> mentions Node<Node<T>>, so discovery never ends.
        let mut rules = rules();
        rules.max_instantiation_rounds = 2;
        rules.instantiate = vec![InstantiationRequest {
            template: "Node".to_string(),
            args: vec!["int".to_string()],
            name: None,
        }];
        let decls = vec![
            RawDecl::new(RawKind::ClassTemplate, "Node")
                .with_template_param("T", None)
                .with_children(vec![
                    RawDecl::new(RawKind::Method, "wrap").with_return("Node<Node<T>>"),
                ]),
        ];
        let generation = Generator::new(&rules).generate(vec![header("node.hpp", decls)]);
        assert_eq!(generation.stats.instantiation_rounds, 2);
        assert!(
            generation
                .diagnostics
                .iter()
                .any(|d| d.kind == DiagnosticKind::InstantiationLimit)
        );
    }

    #[test]
    fn test_empty_header_list_is_rejected() {
        let rules = rules();
        let factory = ProviderFactory::new(crate::config::ProviderKind::Json, Vec::new());
        let err = Generator::new(&rules).run(&factory, &[]).unwrap_err();
        assert!(matches!(err, GenerateError::NoInput));
    }
}
