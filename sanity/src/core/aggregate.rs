//! Reduction of a version's messages into its terminal outcome.

use std::collections::HashSet;

use crate::core::ignore::MessageProcessor;
use crate::core::types::{DiagnosticMessage, Outcome};

/// Drop repeated messages, keeping the first occurrence of each.
pub fn dedupe(messages: Vec<DiagnosticMessage>) -> Vec<DiagnosticMessage> {
    let mut seen = HashSet::new();
    messages
        .into_iter()
        .filter(|message| seen.insert(message.clone()))
        .collect()
}

/// Turn the messages collected for `version` into `Success` or `Failure`.
///
/// `Skipped` is never produced here.
pub fn finalize<P: MessageProcessor + ?Sized>(
    test: &str,
    version: &str,
    messages: Vec<DiagnosticMessage>,
    checked_paths: &[&str],
    processor: &P,
) -> Outcome {
    let results = processor.process(dedupe(messages), checked_paths);
    if results.is_empty() {
        Outcome::Success {
            test: test.to_string(),
            python_version: version.to_string(),
        }
    } else {
        Outcome::Failure {
            test: test.to_string(),
            python_version: version.to_string(),
            messages: results,
        }
    }
}
