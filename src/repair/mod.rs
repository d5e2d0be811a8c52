//! Syntax repair for manifests that do not parse.
//!
//! [`repair`] tries the rules in [`rules::RULES`] one at a time and keeps a
//! rewrite only when a trial parse shows it helped: the text parses, or the
//! first parse error moved further into the text. Valid input is returned
//! untouched.

pub mod rules;
pub mod writer;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::manifest::strip_bom;
use rules::RULES;

pub use writer::{apply_repair, RepairResult};

/// Result of running the repair engine over some text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairOutcome {
    /// True when `content` differs from the input
    pub repaired: bool,
    /// Names of the rules that were kept, in the order they were first kept
    pub applied_fixes: Vec<String>,
    pub still_invalid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub content: String,
}

impl RepairOutcome {
    /// True when the repaired content should replace the original
    pub fn needs_write(&self) -> bool {
        self.repaired && !self.still_invalid
    }
}

/// Position of the first parse error, or `None` when the text parses
fn parse_error(text: &str) -> Option<(usize, usize, String)> {
    match serde_json::from_str::<serde::de::IgnoredAny>(strip_bom(text)) {
        Ok(_) => None,
        Err(e) => Some((e.line(), e.column(), e.to_string())),
    }
}

/// Repair `text` so that it parses, if the rules can
pub fn repair(text: &str) -> RepairOutcome {
    let Some((mut line, mut column, mut message)) = parse_error(text) else {
        return RepairOutcome {
            repaired: false,
            applied_fixes: Vec::new(),
            still_invalid: false,
            error: None,
            content: text.to_string(),
        };
    };

    let mut current = text.to_string();
    let mut applied: Vec<String> = Vec::new();
    let mut parsed = false;

    'sweeps: for sweep in 0..RULES.len() {
        let mut kept_any = false;

        for rule in RULES {
            let Some(candidate) = (rule.apply)(&current) else {
                continue;
            };
            if candidate == current {
                continue;
            }

            match parse_error(&candidate) {
                None => {
                    debug!(rule = rule.name, sweep, "rewrite made the manifest parse");
                    record(&mut applied, rule.name);
                    current = candidate;
                    parsed = true;
                    break 'sweeps;
                }
                Some((l, c, m)) if (l, c) > (line, column) => {
                    debug!(rule = rule.name, sweep, line = l, column = c, "rewrite moved the first error");
                    record(&mut applied, rule.name);
                    current = candidate;
                    (line, column, message) = (l, c, m);
                    kept_any = true;
                }
                Some(_) => {
                    debug!(rule = rule.name, sweep, "rewrite rejected");
                }
            }
        }

        if !kept_any {
            break;
        }
    }

    let repaired = current != text;
    RepairOutcome {
        repaired,
        applied_fixes: applied,
        still_invalid: !parsed,
        error: (!parsed).then(|| format!("Could not fix all syntax errors: {}", message)),
        content: current,
    }
}

fn record(applied: &mut Vec<String>, name: &str) {
    if !applied.iter().any(|a| a == name) {
        applied.push(name.to_string());
    }
}
