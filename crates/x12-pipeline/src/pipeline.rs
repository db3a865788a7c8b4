//! Pipeline orchestration.
//!
//! A pipeline is constructed once (rule sets, custom rules, plugin
//! projectors, error policy) and then processes documents. Only an
//! uninterpretable interchange header fails a run; everything else comes
//! back as a partial document plus diagnostics.

use crate::Result;
use std::path::Path;
use std::time::Duration;
use tracing::debug;
use x12_ast::{DiagnosticCollector, DiagnosticReport, EdiDocument};
use x12_transactions::{PlbSignConvention, Projector, ProjectorRegistry, RemittanceProjector};
use x12_validation::{ErrorPolicy, Rule, RuleEngine, RuleFileLoader, RuleRegistry, RuleSet};

/// Pipeline construction options.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Built-in rule sets to register, in order.
    pub rule_sets: Vec<RuleSet>,
    /// Error-handling policy for rule evaluation.
    pub policy: ErrorPolicy,
    /// Optional wall-clock budget for rule evaluation.
    pub rules_budget: Option<Duration>,
    /// PLB sign convention for the 835 balance identity.
    pub plb_convention: PlbSignConvention,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            rule_sets: vec![RuleSet::Basic],
            policy: ErrorPolicy::default(),
            rules_budget: None,
            plb_convention: PlbSignConvention::default(),
        }
    }
}

/// Result of one processing run: the document plus its diagnostic report.
#[derive(Debug)]
pub struct ProcessOutcome {
    pub document: EdiDocument,
    pub report: DiagnosticReport,
}

/// The parse → project → validate pipeline.
pub struct Pipeline {
    projectors: ProjectorRegistry,
    engine: RuleEngine,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    /// Pipeline with the default configuration.
    pub fn new() -> Self {
        PipelineBuilder::new(PipelineConfig::default()).build()
    }

    /// Pipeline with an explicit configuration.
    pub fn with_config(config: PipelineConfig) -> Self {
        PipelineBuilder::new(config).build()
    }

    /// Start building a customized pipeline.
    pub fn builder(config: PipelineConfig) -> PipelineBuilder {
        PipelineBuilder::new(config)
    }

    /// Process one document.
    ///
    /// The only failure is an invalid interchange header; structural
    /// mismatches, projection findings, and rule violations are all in the
    /// returned report, and the (possibly partial) document is always
    /// available alongside it.
    pub fn process(&self, input: &[u8]) -> Result<ProcessOutcome> {
        let mut diagnostics = DiagnosticCollector::new();
        let mut document = x12_parser::parse(input, &mut diagnostics)?;
        self.projectors
            .project_document(&mut document, &mut diagnostics);
        self.engine.evaluate(&document, &mut diagnostics);
        debug!(
            transactions = document.transaction_count(),
            findings = diagnostics.len(),
            "processed document"
        );
        let report = diagnostics.into_report(self.engine.rules_applied());
        Ok(ProcessOutcome { document, report })
    }

    /// Process a document held as text.
    pub fn process_str(&self, input: &str) -> Result<ProcessOutcome> {
        self.process(input.as_bytes())
    }
}

/// Builder wiring rule sets, custom rules, and plugin projectors.
pub struct PipelineBuilder {
    config: PipelineConfig,
    registry: RuleRegistry,
    projectors: ProjectorRegistry,
}

impl PipelineBuilder {
    fn new(config: PipelineConfig) -> Self {
        let mut registry = RuleRegistry::new();
        for set in &config.rule_sets {
            set.register_into(&mut registry);
        }
        let mut projectors = ProjectorRegistry::with_builtins();
        projectors.register(
            "835",
            Box::new(RemittanceProjector::new(config.plb_convention)),
        );
        Self {
            config,
            registry,
            projectors,
        }
    }

    /// Register an additional built-in rule set.
    pub fn with_rule_set(mut self, set: RuleSet) -> Self {
        set.register_into(&mut self.registry);
        self
    }

    /// Register a single custom rule.
    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.registry.add(rule);
        self
    }

    /// Register every rule from a YAML rule-definition file.
    pub fn with_rule_file(mut self, path: &Path) -> Result<Self> {
        let file = RuleFileLoader::load_from_file(path)?;
        for rule in file.into_rules() {
            self.registry.add(rule);
        }
        Ok(self)
    }

    /// Register a projector for an additional transaction-set code, with
    /// any default rules that should evaluate alongside it. This is the
    /// plugin surface; nothing is loaded dynamically.
    pub fn with_projector(
        mut self,
        code: impl Into<String>,
        projector: Box<dyn Projector>,
        default_rules: Vec<Rule>,
    ) -> Self {
        self.projectors.register(code, projector);
        for rule in default_rules {
            self.registry.add(rule);
        }
        self
    }

    /// Finish building.
    pub fn build(self) -> Pipeline {
        let mut engine = RuleEngine::new(self.registry).with_policy(self.config.policy);
        if let Some(budget) = self.config.rules_budget {
            engine = engine.with_budget(budget);
        }
        Pipeline {
            projectors: self.projectors,
            engine,
        }
    }
}
