use clap::Parser;
use serde::Deserialize;

#[derive(Parser)]
#[command(name = "labjudge", version = "1.0", about, long_about = None)]
pub struct CliArgs {
    /// Path to an optional configuration file
    #[arg(long = "config", short = 'c')]
    pub config_path: Option<String>,

    /// Path to an exercise catalog JSON file (defaults to the built-in catalog)
    #[arg(long = "catalog")]
    pub catalog_path: Option<String>,

    /// Id of the exercise to grade against
    #[arg(long = "exercise", short = 'e')]
    pub exercise_id: Option<String>,

    /// Path to the candidate source file to grade
    #[arg(long = "source", short = 's')]
    pub source_path: Option<String>,

    /// List the available exercises and exit
    #[arg(long = "list", short = 'l', default_value_t = false)]
    pub list: bool,
}

impl CliArgs {
    /// Load the configuration from the specified file, or defaults.
    pub fn to_config(&self) -> anyhow::Result<Config> {
        match &self.config_path {
            Some(path) => {
                let file = std::fs::File::open(path)?;
                let reader = std::io::BufReader::new(file);
                Ok(serde_json::from_reader(reader)?)
            }
            None => Ok(Config::default()),
        }
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct Config {
    #[serde(default)]
    pub limits: LimitsConfig,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MilliSecond(pub u64);

/// Resource budget for one candidate invocation.
///
/// The loop iteration ceiling is what actually stops runaway code: the
/// interpreter cannot be preempted mid-eval, so the wall-clock budget
/// only classifies a finished invocation as over time.
#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(default)]
pub struct LimitsConfig {
    pub time_limit: MilliSecond,
    pub loop_iteration_limit: u64,
    pub recursion_limit: usize,
    pub stack_size_limit: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            time_limit: MilliSecond(1000),
            loop_iteration_limit: 4_000_000,
            recursion_limit: 512,
            stack_size_limit: 1 << 16,
        }
    }
}
