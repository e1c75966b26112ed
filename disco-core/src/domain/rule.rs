// disco-core/src/domain/rule.rs

use std::fmt;

use crate::domain::error::DomainError;
use crate::domain::knowledge::Knowledge;

/// How a rule folds the per-dependency checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuleOp {
    #[default]
    All,
    Any,
}

impl RuleOp {
    pub fn fold<I: IntoIterator<Item = bool>>(self, checks: I) -> bool {
        let mut iter = checks.into_iter();
        match self {
            RuleOp::All => iter.all(|c| c),
            RuleOp::Any => iter.any(|c| c),
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "all" => Some(RuleOp::All),
            "any" => Some(RuleOp::Any),
            _ => None,
        }
    }
}

impl fmt::Display for RuleOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleOp::All => write!(f, "all"),
            RuleOp::Any => write!(f, "any"),
        }
    }
}

/// Declarative dependency/handler pair. A rule is *matched* once its
/// dependencies exist in the knowledge base and validate against their
/// interface schemas; *complete* once its handler has exited zero (sticky
/// while `once` holds).
#[derive(Debug, Clone)]
pub struct Rule {
    deps: Vec<String>,
    op: RuleOp,
    cmd: String,
    // Once complete the rule shouldn't be run again
    once: bool,
    complete: bool,
    fail_ct: u32,
}

impl Rule {
    pub fn new(
        deps: Vec<String>,
        cmd: impl Into<String>,
        op: RuleOp,
    ) -> Result<Self, DomainError> {
        let cmd = cmd.into();
        if deps.is_empty() {
            return Err(DomainError::EmptyDeps { cmd });
        }
        Ok(Self {
            deps,
            op,
            cmd,
            once: true,
            complete: false,
            fail_ct: 0,
        })
    }

    pub fn deps(&self) -> &[String] {
        &self.deps
    }

    pub fn op(&self) -> RuleOp {
        self.op
    }

    pub fn cmd(&self) -> &str {
        &self.cmd
    }

    pub fn complete(&self) -> bool {
        self.complete && self.once
    }

    pub fn set_complete(&mut self, value: bool) {
        self.complete = value;
    }

    pub fn fail_count(&self) -> u32 {
        self.fail_ct
    }

    /// Count a failed handler attempt; returns the new count.
    pub fn record_failure(&mut self) -> u32 {
        self.fail_ct += 1;
        self.fail_ct
    }

    /// A successful attempt forgives earlier failures.
    pub fn reset_failures(&mut self) {
        self.fail_ct = 0;
    }

    /// Whether every (or any, for `RuleOp::Any`) dependency both exists and
    /// validates against its interface schema. Absent deps never validate.
    pub fn matches(&self, kb: &Knowledge) -> bool {
        let exists = self.deps.iter().map(|d| kb.get(d).is_some());
        if !self.op.fold(exists) {
            return false;
        }
        let valid = self
            .deps
            .iter()
            .map(|d| kb.is_valid(interface_of(d), Some(d)));
        self.op.fold(valid)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}) -> {}", self.op, self.deps.join(" "), self.cmd)
    }
}

/// Top-level key of a dependency path names the schema expected to validate
/// it. This convention is shared with handler payload assembly.
pub fn interface_of(dep: &str) -> &str {
    dep.split('.').next().unwrap_or(dep)
}
