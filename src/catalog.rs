use std::sync::Arc;

use anyhow::{Context, bail};
use serde::Deserialize;

/// One test case of an exercise.
///
/// `input_literal` must parse through the codec into an argument list;
/// `expected_literal` must be written in the codec's canonical result
/// form, since grading compares by exact text equality.
#[derive(Deserialize, Debug, Clone)]
pub struct TestCase {
    pub input_literal: String,
    pub expected_literal: String,
    pub description: String,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// How the executor reaches the candidate's code.
///
/// Function-shaped exercises call `name` with every parsed argument.
/// Class-shaped exercises construct `name` with the first `ctor_args`
/// parsed arguments and call `method` with the rest; when
/// `shared_instance` is set the instance built for the first test case
/// is reused for the whole run instead of a fresh one per case.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryPoint {
    Function {
        name: String,
    },
    Class {
        name: String,
        ctor_args: usize,
        method: String,
        #[serde(default)]
        shared_instance: bool,
    },
}

/// An immutable exercise definition, shared read-only across sessions.
#[derive(Deserialize, Debug, Clone)]
pub struct Exercise {
    pub id: String,
    pub title: String,
    pub prompt: String,
    pub difficulty: Difficulty,
    pub category: String,
    pub starter_code: String,
    /// Shown to the user on request and exercised by the test suite;
    /// never consulted during grading.
    pub reference_solution: String,
    pub entry: EntryPoint,
    pub test_cases: Vec<TestCase>,
    #[serde(default)]
    pub hints: Vec<String>,
}

/// The read-only exercise catalog, constructed explicitly and handed to
/// session controllers (no ambient singletons).
#[derive(Debug)]
pub struct Catalog {
    exercises: Vec<Arc<Exercise>>,
}

impl Catalog {
    /// Loads a catalog from a JSON file.
    pub fn from_json_file(path: &str) -> anyhow::Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("failed to open catalog file {path}"))?;
        let reader = std::io::BufReader::new(file);
        let exercises: Vec<Exercise> =
            serde_json::from_reader(reader).context("failed to parse catalog JSON")?;
        Self::build(exercises)
    }

    /// The built-in catalog embedded in the binary.
    pub fn builtin() -> anyhow::Result<Self> {
        let exercises: Vec<Exercise> = serde_json::from_str(include_str!("../data/exercises.json"))
            .context("built-in catalog is malformed")?;
        Self::build(exercises)
    }

    fn build(exercises: Vec<Exercise>) -> anyhow::Result<Self> {
        let mut seen = std::collections::HashSet::new();
        for exercise in &exercises {
            if exercise.id.is_empty() {
                bail!("exercise with empty id");
            }
            if !seen.insert(exercise.id.clone()) {
                bail!("duplicate exercise id `{}`", exercise.id);
            }
            if exercise.test_cases.is_empty() {
                bail!("exercise `{}` has no test cases", exercise.id);
            }
        }

        log::info!("Catalog loaded with {} exercises", exercises.len());
        Ok(Self {
            exercises: exercises.into_iter().map(Arc::new).collect(),
        })
    }

    pub fn get(&self, id: &str) -> Option<Arc<Exercise>> {
        self.exercises.iter().find(|e| e.id == id).cloned()
    }

    pub fn exercises(&self) -> &[Arc<Exercise>] {
        &self.exercises
    }
}
