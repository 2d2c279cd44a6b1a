//! Navigation into response trees by key and index.

use std::fmt;

use dtm_edn::{EdnError, Value, parse};
use thiserror::Error;

/// Errors raised while parsing or following a [`Path`].
#[derive(Debug, Clone, PartialEq, Error)]
pub(crate) enum PathError {
    /// The path text is not valid EDN.
    #[error("error parsing path vector: {source}")]
    Parse {
        /// Reader diagnostic.
        #[source]
        source: EdnError,
    },
    /// The path text is valid EDN but not a vector.
    #[error("path must be an EDN vector, found {kind}")]
    NotAVector {
        /// Kind of the parsed value.
        kind: &'static str,
    },
    /// A path element cannot be used as a step.
    #[error("path steps must be integers or atoms, found {kind}")]
    InvalidStep {
        /// Kind of the offending element.
        kind: &'static str,
    },
    /// A step did not match anything in the value it was applied to.
    #[error("could not find item {step} in {value}")]
    NotFound {
        /// The step that failed.
        step: PathStep,
        /// Printed form of the value the step was applied to.
        value: String,
    },
}

/// One step of a [`Path`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PathStep {
    /// Matches a map key by its literal text.
    ByKey(String),
    /// Zero-based position in a sequence, or an integer key of a map.
    ByIndex(usize),
}

impl fmt::Display for PathStep {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ByKey(key) => formatter.write_str(key),
            Self::ByIndex(index) => write!(formatter, "{index}"),
        }
    }
}

/// Ordered steps leading from a root value to a nested one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Path {
    steps: Vec<PathStep>,
}

impl Path {
    #[cfg(test)]
    pub(crate) fn new(steps: Vec<PathStep>) -> Self {
        Self { steps }
    }

    /// Parses EDN vector text such as `[:tx-data 0 :e]`.
    ///
    /// Non-negative integers become index steps; every other scalar or atom
    /// becomes a key step matched against its literal text.
    pub(crate) fn parse(text: &str) -> Result<Self, PathError> {
        let value = parse(text).map_err(|source| PathError::Parse { source })?;
        let Value::Vector(items) = &value else {
            return Err(PathError::NotAVector { kind: value.kind() });
        };
        let steps = items
            .iter()
            .map(|item| match item {
                Value::Int(number) => Ok(usize::try_from(*number)
                    .map_or_else(|_| PathStep::ByKey(number.to_string()), PathStep::ByIndex)),
                other => other
                    .literal()
                    .map(PathStep::ByKey)
                    .ok_or(PathError::InvalidStep { kind: other.kind() }),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { steps })
    }

    /// Builds a path of key steps.
    pub(crate) fn keys<'a, I>(keys: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        Self {
            steps: keys
                .into_iter()
                .map(|key| PathStep::ByKey(key.to_owned()))
                .collect(),
        }
    }

    pub(crate) fn steps(&self) -> &[PathStep] {
        &self.steps
    }
}

/// Follows `path` from `root`.
pub(crate) fn navigate<'v>(root: &'v Value, path: &Path) -> Result<&'v Value, PathError> {
    path.steps()
        .iter()
        .try_fold(root, |current, step| apply_step(current, step))
}

/// Whether every step of `path` resolves from `root`.
pub(crate) fn path_exists(root: &Value, path: &Path) -> bool {
    navigate(root, path).is_ok()
}

fn apply_step<'v>(current: &'v Value, step: &PathStep) -> Result<&'v Value, PathError> {
    let found = match (current, step) {
        (Value::Map(map), PathStep::ByKey(key)) => map.get(key),
        (Value::Map(map), PathStep::ByIndex(index)) => map.get(&index.to_string()),
        (Value::List(items) | Value::Vector(items) | Value::Set(items), PathStep::ByIndex(index)) => {
            items.get(*index)
        }
        (
            Value::Nil
            | Value::Bool(_)
            | Value::Int(_)
            | Value::Float(_)
            | Value::String(_)
            | Value::Char(_)
            | Value::Keyword(_)
            | Value::Symbol(_)
            | Value::Tagged { .. }
            | Value::List(_)
            | Value::Vector(_)
            | Value::Set(_),
            _,
        ) => None,
    };
    found.ok_or_else(|| PathError::NotFound {
        step: step.clone(),
        value: current.to_edn(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn sample() -> Value {
        parse(
            "{:tx-data [{:e 1 :a 10} {:e 2 :a 11}] :tempids {-1 17} \"name\" \"Ann\" \
             1 :one 0 :zero 17592186045418 {:person/name \"Ann\"}}",
        )
        .expect("valid sample")
    }

    #[rstest]
    #[case("[:tx-data 1 :e]", "2")]
    #[case("[:tempids -1]", "17")]
    #[case("[name]", "\"Ann\"")]
    #[case("[:tx-data 0 :a]", "10")]
    #[case("[0]", ":zero")]
    #[case("[1]", ":one")]
    #[case("[17592186045418 :person/name]", "\"Ann\"")]
    fn navigates_existing_paths(#[case] path: &str, #[case] expected: &str) {
        let root = sample();
        let path = Path::parse(path).expect("valid path");
        let value = navigate(&root, &path).expect("path exists");
        assert_eq!(value.to_edn(), expected);
        assert!(path_exists(&root, &path));
    }

    #[rstest]
    #[case("[:missing]", "could not find item :missing in")]
    #[case("[:tx-data 5]", "could not find item 5 in [")]
    #[case("[:tx-data :e]", "could not find item :e in [")]
    #[case("[:tx-data 0 :e 0]", "could not find item 0 in 1")]
    #[case("[2]", "could not find item 2 in {")]
    fn reports_the_failing_step(#[case] path: &str, #[case] message: &str) {
        let root = sample();
        let path = Path::parse(path).expect("valid path");
        let error = navigate(&root, &path).expect_err("path must fail");
        assert!(
            error.to_string().starts_with(message),
            "unexpected message {error}"
        );
        assert!(!path_exists(&root, &path));
    }

    #[test]
    fn index_steps_walk_sets_and_lists() {
        let root = parse("(#{:a} [:b])").expect("valid list");
        let path = Path::new(vec![PathStep::ByIndex(0), PathStep::ByIndex(0)]);
        assert_eq!(navigate(&root, &path), Ok(&Value::keyword("a")));
    }

    #[test]
    fn empty_path_returns_root() {
        let root = sample();
        assert_eq!(navigate(&root, &Path::default()), Ok(&root));
    }

    #[test]
    fn key_steps_match_literal_text() {
        let root = sample();
        assert!(path_exists(&root, &Path::keys([":tempids"])));
        assert!(!path_exists(&root, &Path::keys(["tempids"])));
    }

    #[rstest]
    #[case("[0", "error parsing path vector")]
    #[case("{:a 1}", "path must be an EDN vector, found map")]
    #[case("[[0]]", "path steps must be integers or atoms, found vector")]
    fn rejects_malformed_paths(#[case] text: &str, #[case] message: &str) {
        let error = Path::parse(text).expect_err("path must fail");
        assert!(error.to_string().starts_with(message));
    }
}
