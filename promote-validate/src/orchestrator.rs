//! Batch orchestrator: runs every rule in order and decides GO / NO-GO.
//!
//! Forced and advisory outcomes are logged and the run continues, so one pass
//! reports every violation. A failure without override stops the run at once
//! and surfaces as a [`ValidateError`] naming the rule.

use promote_core::BatchContext;
use serde::Serialize;

use crate::error::ValidateError;
use crate::rules::{evaluate, Policy, Rule, RuleEnv, RuleRecord, RuleResult, RULES};

/// Every rule outcome of a run that did not abort.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub records: Vec<RuleRecord>,
}

impl BatchReport {
    /// Rules whose violations were suppressed by the override flag.
    pub fn forced(&self) -> impl Iterator<Item = &RuleRecord> {
        self.records
            .iter()
            .filter(|r| r.result == RuleResult::PassedForced)
    }

    /// Rules that reported advisory findings.
    pub fn advisories(&self) -> impl Iterator<Item = &RuleRecord> {
        self.records
            .iter()
            .filter(|r| r.result == RuleResult::Inconclusive)
    }

    /// True when every rule passed outright.
    pub fn is_clean(&self) -> bool {
        self.records.iter().all(|r| r.result == RuleResult::Passed)
    }
}

/// Run the standard rule set against `ctx`.
pub fn validate(ctx: &mut BatchContext, env: &RuleEnv<'_>) -> Result<BatchReport, ValidateError> {
    run_rules(ctx, env, &RULES)
}

/// Run `rules` in order; numbering restarts at 1 on every call.
pub fn run_rules(
    ctx: &mut BatchContext,
    env: &RuleEnv<'_>,
    rules: &[Rule],
) -> Result<BatchReport, ValidateError> {
    ctx.reset_sequence();
    let force = ctx.force();
    let mut report = BatchReport::default();

    for rule in rules {
        let seq = ctx.next_sequence();
        tracing::info!("Test {seq}: {}", rule.title);
        let finding = (rule.check)(ctx, env).map_err(|e| {
            tracing::error!("Deployment aborted: Test {seq} could not run: {e}");
            e
        })?;
        let record = evaluate(seq, rule, finding, force);
        let message = record.message.clone().unwrap_or_default();

        match record.result {
            RuleResult::Passed => {}
            RuleResult::PassedForced | RuleResult::Inconclusive => tracing::warn!("{message}"),
            RuleResult::Failed => {
                tracing::error!("Deployment aborted: {message}");
                return Err(match rule.policy {
                    Policy::Mandatory => ValidateError::MalformedPackage { rule: seq, message },
                    Policy::Overridable | Policy::Advisory => ValidateError::Violation {
                        rule: seq,
                        title: rule.title,
                        message,
                    },
                });
            }
        }
        tracing::info!("Test {seq}: {}", record.result);
        report.records.push(record);
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use promote_core::types::CommitAuthor;

    use super::*;
    use crate::error::TransportError;
    use crate::identity::{NameQuery, UserDirectory, UserSearch};

    struct CaptureLogger(Mutex<Vec<String>>);

    impl tracing::Log for CaptureLogger {
        fn enabled(&self, _: &tracing::Metadata<'_>) -> bool {
            true
        }

        fn log(&self, record: &tracing::Record<'_>) {
            if let Ok(mut lines) = self.0.lock() {
                lines.push(format!("{} {}", record.level(), record.args()));
            }
        }

        fn flush(&self) {}
    }

    static LOGGER: CaptureLogger = CaptureLogger(Mutex::new(Vec::new()));

    struct Unreachable;

    impl UserDirectory for Unreachable {
        fn search(&self, _: &NameQuery) -> Result<UserSearch, TransportError> {
            Err(TransportError::Connection {
                method: "POST",
                url: "https://tracker.example.com/api/v3/users/search".into(),
                message: "connection refused".into(),
            })
        }
    }

    #[test]
    fn transport_failure_inside_a_rule_is_reported_as_abort() {
        let _ = tracing::set_logger(&LOGGER);
        tracing::set_max_level(tracing::LevelFilter::Info);

        let author = CommitAuthor {
            name: "Doe, John (ACME)".into(),
            email: "j.doe@x.com".into(),
        };
        let env = RuleEnv {
            directory: &Unreachable,
            author: &author,
        };
        let mut ctx = BatchContext::new(true);
        let err = validate(&mut ctx, &env).unwrap_err();
        assert!(matches!(err, ValidateError::Transport(_)), "got: {err}");
        assert_eq!(err.rule(), None);

        let lines = LOGGER.0.lock().expect("log lines");
        assert!(
            lines.iter().any(|l| l.starts_with("ERROR Deployment aborted: Test 7 could not run")
                && l.contains("connection refused")),
            "logged: {lines:?}"
        );
    }
}
