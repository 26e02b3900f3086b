//! Sweep-point expansion: turn a [`ScriptSpec`] into concrete argument vectors.

use crate::config::{ArgumentSet, ScriptSpec};
use crate::error::SkipReason;

/// One concrete execution of a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepPoint {
    /// Zero-based position within the script's sweep.
    pub index: usize,

    /// Full argument vector, default arguments first.
    pub arguments: Vec<String>,

    /// Sparse key/value record feeding the dynamic report columns.
    pub record: ArgumentSet,
}

/// Expand a script into its sweep points, in configuration order.
///
/// A script without extra argument sets yields exactly one point running the
/// default arguments verbatim with an empty record. Each extra set appends
/// `--key value` per pair, or only `--key` when the value is empty.
///
/// Scripts without default arguments are not expanded.
pub fn expand(spec: &ScriptSpec) -> Result<Vec<SweepPoint>, SkipReason> {
    if spec.default_arguments.is_empty() {
        return Err(SkipReason::NoDefaultArguments {
            script: spec.name.clone(),
        });
    }

    if spec.extra_arguments.is_empty() {
        return Ok(vec![SweepPoint {
            index: 0,
            arguments: spec.default_arguments.clone(),
            record: ArgumentSet::new(),
        }]);
    }

    Ok(spec
        .extra_arguments
        .iter()
        .enumerate()
        .map(|(index, set)| SweepPoint {
            index,
            arguments: argument_vector(&spec.default_arguments, set),
            record: set.clone(),
        })
        .collect())
}

/// Append the flag encoding of `set` to a copy of `defaults`.
pub fn argument_vector(defaults: &[String], set: &ArgumentSet) -> Vec<String> {
    let mut arguments = defaults.to_vec();
    for (key, value) in set.iter() {
        arguments.push(format!("--{}", key));
        if !value.is_empty() {
            arguments.push(value.to_string());
        }
    }
    arguments
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(defaults: &[&str], extra: Vec<ArgumentSet>) -> ScriptSpec {
        ScriptSpec {
            name: "bench1".to_string(),
            path: "./bench.sh".into(),
            default_arguments: defaults.iter().map(|s| s.to_string()).collect(),
            extra_arguments: extra,
            ..Default::default()
        }
    }

    fn set(pairs: &[(&str, &str)]) -> ArgumentSet {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_no_extra_arguments_single_point() {
        let points = expand(&spec(&["--mode", "fast"], vec![])).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].arguments, vec!["--mode", "fast"]);
        assert!(points[0].record.is_empty());
    }

    #[test]
    fn test_one_point_per_extra_set() {
        let points = expand(&spec(
            &["--mode", "fast"],
            vec![set(&[("threads", "4")]), set(&[("threads", "8")])],
        ))
        .unwrap();

        assert_eq!(points.len(), 2);
        assert_eq!(points[0].arguments, vec!["--mode", "fast", "--threads", "4"]);
        assert_eq!(points[1].arguments, vec!["--mode", "fast", "--threads", "8"]);
        assert_eq!(points[1].index, 1);
        assert_eq!(points[1].record.get("threads"), Some("8"));
    }

    #[test]
    fn test_empty_value_is_bare_flag() {
        let points = expand(&spec(
            &["run"],
            vec![set(&[("verbose", ""), ("batch", "32")])],
        ))
        .unwrap();
        assert_eq!(points[0].arguments, vec!["run", "--verbose", "--batch", "32"]);
    }

    #[test]
    fn test_pairs_appended_in_set_order() {
        let points = expand(&spec(&["x"], vec![set(&[("b", "1"), ("a", "2")])])).unwrap();
        assert_eq!(points[0].arguments, vec!["x", "--b", "1", "--a", "2"]);
    }

    #[test]
    fn test_missing_default_arguments_is_skipped() {
        let err = expand(&spec(&[], vec![set(&[("threads", "4")])])).unwrap_err();
        assert_eq!(
            err,
            SkipReason::NoDefaultArguments {
                script: "bench1".to_string()
            }
        );
    }

    #[test]
    fn test_empty_extra_set_runs_defaults() {
        let points = expand(&spec(&["x"], vec![ArgumentSet::new()])).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].arguments, vec!["x"]);
    }
}
