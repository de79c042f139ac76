//! Task entity and keyword extraction
//!
//! A [`Task`] is created by the host at cycle start and threaded through
//! every phase. Decision parameters (options, voting method, consensus
//! settings) ride on the task so the decision engine needs no separate
//! request type, mirroring how hosts hand work to the coordinator.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use uuid::Uuid;

/// Parameters controlling a consensus-building run
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConsensusParams {
    /// Aggregate support share required to declare consensus (0.0 to 1.0)
    pub threshold: f64,
    /// Maximum discussion rounds before settling for partial consensus
    pub max_rounds: usize,
}

impl Default for ConsensusParams {
    fn default() -> Self {
        Self {
            threshold: 0.75,
            max_rounds: 3,
        }
    }
}

/// A unit of work processed by one EDRR cycle
///
/// # Example
///
/// ```
/// use edrr_domain::Task;
///
/// let task = Task::new("Add caching to the retrieval layer")
///     .with_domain("performance")
///     .with_options(["lru cache", "write-through cache"]);
/// assert!(task.flatten_keywords().contains("caching"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique task identifier
    pub id: String,
    /// What the task asks for
    pub description: String,
    /// Domain tag used for vote weighting and tie-breaking
    pub domain: Option<String>,
    /// Arbitrarily nested context supplied by the host
    pub context: Value,
    /// Solution carried forward from prior iterations
    pub solution: Option<Value>,
    /// How fine-grained this task already is; low scores stop recursion
    pub granularity_score: Option<f64>,
    /// Candidate options for votes and consensus building
    pub options: Vec<String>,
    /// Requested voting method ("majority" or "weighted"); unvalidated here
    pub voting_method: Option<String>,
    /// Consensus-building parameters, defaulted when absent
    pub consensus: Option<ConsensusParams>,
    /// Subtasks eligible for recursive micro cycles
    pub subtasks: Vec<Task>,
    /// Host override for recursion ("terminate" or "continue")
    pub human_override: Option<String>,
}

impl Task {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            description: description.into(),
            domain: None,
            context: Value::Null,
            solution: None,
            granularity_score: None,
            options: Vec::new(),
            voting_method: None,
            consensus: None,
            subtasks: Vec::new(),
            human_override: None,
        }
    }

    // ==================== Builder Methods ====================

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = context;
        self
    }

    pub fn with_solution(mut self, solution: Value) -> Self {
        self.solution = Some(solution);
        self
    }

    pub fn with_granularity_score(mut self, score: f64) -> Self {
        self.granularity_score = Some(score);
        self
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_voting_method(mut self, method: impl Into<String>) -> Self {
        self.voting_method = Some(method.into());
        self
    }

    pub fn with_consensus(mut self, params: ConsensusParams) -> Self {
        self.consensus = Some(params);
        self
    }

    pub fn with_subtask(mut self, subtask: Task) -> Self {
        self.subtasks.push(subtask);
        self
    }

    // ==================== Accessors ====================

    /// Flatten the task into a lowercase keyword set.
    ///
    /// Recursively collects every string value from the description, the
    /// domain tag, and the nested context (object values, array elements,
    /// and object keys are all visited), splitting on whitespace. This is
    /// the single keyword accessor used for expertise scoring everywhere.
    pub fn flatten_keywords(&self) -> BTreeSet<String> {
        let mut keywords = BTreeSet::new();
        collect_words(&self.description, &mut keywords);
        if let Some(domain) = &self.domain {
            collect_words(domain, &mut keywords);
        }
        collect_value(&self.context, &mut keywords);
        keywords
    }

    /// Consensus parameters, defaulted when the host supplied none.
    pub fn consensus_params(&self) -> ConsensusParams {
        self.consensus.unwrap_or_default()
    }
}

fn collect_words(text: &str, out: &mut BTreeSet<String>) {
    for word in text.split_whitespace() {
        let word = word
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        if !word.is_empty() {
            out.insert(word);
        }
    }
}

fn collect_value(value: &Value, out: &mut BTreeSet<String>) {
    match value {
        Value::String(s) => collect_words(s, out),
        Value::Array(items) => {
            for item in items {
                collect_value(item, out);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                collect_words(key, out);
                collect_value(item, out);
            }
        }
        _ => {}
    }
}
