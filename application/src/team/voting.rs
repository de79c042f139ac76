//! Critical-decision voting
//!
//! Each agent votes for the option its expertise tags match best; an
//! agent with no match votes by seeded random choice so outcomes stay
//! reproducible under a fixed seed. Resolution never returns an
//! unresolved tie: the tie-break chain runs Primus vote, then task
//! domain relevance, then a seeded random pick.

use super::{DecisionEngine, Voter};
use edrr_domain::{Agent, Task, VoteMethod, VoteRecord, VoteStatus};
use std::collections::BTreeMap;
use tracing::{debug, info};

impl Voter for DecisionEngine {
    fn vote_on_critical_decision(&mut self, task: &Task) -> VoteRecord {
        let record = self.conduct_vote(task);
        info!(
            task_id = %task.id,
            status = ?record.status,
            result = record.result.as_deref().unwrap_or("-"),
            "critical decision vote concluded"
        );
        self.push_vote_record(record.clone());
        record
    }
}

impl DecisionEngine {
    fn conduct_vote(&mut self, task: &Task) -> VoteRecord {
        if self.agents().is_empty() {
            return VoteRecord::failed(&task.id, "no agents available to vote");
        }
        if task.options.is_empty() {
            return VoteRecord::failed(&task.id, "no options provided for voting");
        }
        let method = match task
            .voting_method
            .as_deref()
            .unwrap_or("majority")
            .parse::<VoteMethod>()
        {
            Ok(method) => method,
            Err(reason) => return VoteRecord::failed(&task.id, reason),
        };

        let mut record = VoteRecord::new(&task.id, method, task.options.clone());
        self.collect_votes(&mut record, task);

        match method {
            VoteMethod::Majority => self.resolve_majority(&mut record, task),
            VoteMethod::Weighted => self.resolve_weighted(&mut record, task),
        }
        record
    }

    fn collect_votes(&mut self, record: &mut VoteRecord, task: &Task) {
        let agents: Vec<Agent> = self.agents().to_vec();
        for agent in &agents {
            let scores: Vec<usize> = task
                .options
                .iter()
                .map(|option| agent.expertise_matches(option))
                .collect();
            let max = scores.iter().copied().max().unwrap_or(0);

            if max > 0 {
                let best: Vec<String> = task
                    .options
                    .iter()
                    .zip(&scores)
                    .filter(|(_, score)| **score == max)
                    .map(|(option, _)| option.clone())
                    .collect();
                let Some(choice) = self.choose(&best).cloned() else {
                    continue;
                };
                record.record_vote(
                    &agent.name,
                    &choice,
                    format!("expertise match ({max} tags) for '{choice}'"),
                );
            } else {
                let Some(choice) = self.choose(&task.options).cloned() else {
                    continue;
                };
                record.record_vote(&agent.name, &choice, "no expertise match; random selection");
            }
        }
    }

    fn resolve_majority(&mut self, record: &mut VoteRecord, task: &Task) {
        let leaders = record.leading_options();
        if let [winner] = leaders.as_slice() {
            let count = record.tally().get(winner).copied().unwrap_or(0);
            let total = record.votes.len();
            let winner = winner.clone();
            record.resolve(
                &winner,
                format!("'{winner}' won with {count} of {total} votes"),
            );
        } else {
            record.status = VoteStatus::Tied;
            self.break_tie(record, task, leaders);
        }
    }

    fn resolve_weighted(&mut self, record: &mut VoteRecord, task: &Task) {
        let domain = task.domain.as_deref().unwrap_or("general");
        let weights: BTreeMap<String, f64> = self
            .agents()
            .iter()
            .map(|agent| {
                (
                    agent.name.clone(),
                    1.0 + agent.expertise_matches(domain) as f64,
                )
            })
            .collect();
        record.weights = Some(weights);

        let leaders = record.leading_weighted_options();
        if let [winner] = leaders.as_slice() {
            let sum = record.weighted_tally().get(winner).copied().unwrap_or(0.0);
            let winner = winner.clone();
            record.resolve(
                &winner,
                format!("'{winner}' won the weighted vote with total weight {sum:.2}"),
            );
        } else {
            record.status = VoteStatus::Tied;
            self.break_tie(record, task, leaders);
        }
    }

    /// Tie-break chain: Primus vote, task domain relevance, seeded random.
    fn break_tie(&mut self, record: &mut VoteRecord, task: &Task, tied: Vec<String>) {
        debug!(tied = ?tied, "vote tied; applying tie-break chain");

        if let Some(primus) = self.primus().map(str::to_string) {
            if let Some(vote) = record.votes.get(&primus).cloned() {
                if tied.contains(&vote) {
                    record.resolve(
                        &vote,
                        format!("tie broken by Primus {primus}'s vote for '{vote}'"),
                    );
                    return;
                }
            }
        }

        if let Some(domain) = task.domain.as_deref() {
            let domain_lc = domain.to_lowercase();
            let matched = tied.iter().find(|option| {
                let option = option.to_lowercase();
                option.contains(&domain_lc) || domain_lc.contains(&option)
            });
            if let Some(winner) = matched.cloned() {
                record.resolve(
                    &winner,
                    format!("tie broken by relevance to task domain '{domain}'"),
                );
                return;
            }
        }

        if let Some(winner) = self.choose(&tied).cloned() {
            record.resolve(
                &winner,
                format!("tie broken by seeded random choice of '{winner}'"),
            );
        }
    }
}
