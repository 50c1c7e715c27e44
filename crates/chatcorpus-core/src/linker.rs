//! Conversational chain reconstruction for one group.
//!
//! Each record is used exactly once: as an instruction, as a response, or as a
//! standalone raw unit. A record's response is, in order of preference:
//!
//! 1. the first later, unused record whose `reply_id` names it (any distance)
//! 2. the immediately next record, when it is unused, arrives within the time
//!    window, comes from a different author, and does not repeat the text
//!
//! Only the immediately next record is ever considered for an implicit link.

use std::collections::HashMap;

use chatcorpus_schema::{MessageRecord, PairMeta, QaPair, RawUnit};
use tracing::debug;

use crate::similarity::SimilarityScorer;

pub const DEFAULT_TIME_WINDOW_SECS: i64 = 120;

/// Time-ordered messages of one conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationGroup {
    pub group_id: String,
    pub records: Vec<MessageRecord>,
}

/// Split records by `group_id`, keeping groups in order of first appearance
/// and sorting each group by time. Equal timestamps keep their log order.
pub fn group_records(records: Vec<MessageRecord>) -> Vec<ConversationGroup> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<ConversationGroup> = Vec::new();

    for record in records {
        let slot = *index.entry(record.group_id.clone()).or_insert_with(|| {
            groups.push(ConversationGroup {
                group_id: record.group_id.clone(),
                records: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].records.push(record);
    }

    for group in &mut groups {
        group.records.sort_by_key(|record| record.time);
    }

    groups
}

/// Pairs and leftovers produced from one or more groups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkOutput {
    pub pairs: Vec<QaPair>,
    pub raw: Vec<RawUnit>,
}

impl LinkOutput {
    pub fn extend(&mut self, other: LinkOutput) {
        self.pairs.extend(other.pairs);
        self.raw.extend(other.raw);
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ConversationLinker {
    scorer: SimilarityScorer,
    time_window_secs: i64,
}

impl Default for ConversationLinker {
    fn default() -> Self {
        Self::new(SimilarityScorer::default(), DEFAULT_TIME_WINDOW_SECS)
    }
}

impl ConversationLinker {
    pub fn new(scorer: SimilarityScorer, time_window_secs: i64) -> Self {
        Self {
            scorer,
            time_window_secs,
        }
    }

    /// Link one time-sorted group.
    pub fn link(&self, group: &ConversationGroup) -> LinkOutput {
        let records = &group.records;
        let mut consumed = vec![false; records.len()];
        let mut output = LinkOutput::default();

        for current in 0..records.len() {
            if consumed[current] {
                continue;
            }
            consumed[current] = true;

            let response = self
                .explicit_response(records, &consumed, current)
                .or_else(|| self.implicit_response(records, &consumed, current));

            let instruction = &records[current];
            match response {
                Some(index) => {
                    consumed[index] = true;
                    let reply = &records[index];
                    output.pairs.push(QaPair {
                        instruction: instruction.content.clone(),
                        output: reply.content.clone(),
                        meta: PairMeta {
                            group: group.group_id.clone(),
                            time_gap: reply.time.saturating_sub(instruction.time),
                        },
                    });
                }
                None => output.raw.push(RawUnit(instruction.content.clone())),
            }
        }

        debug!(
            group = %group.group_id,
            records = records.len(),
            pairs = output.pairs.len(),
            raw = output.raw.len(),
            "linked conversation group"
        );
        output
    }

    /// Link every group and concatenate the results in group order.
    pub fn link_all(&self, groups: &[ConversationGroup]) -> LinkOutput {
        let mut output = LinkOutput::default();
        for group in groups {
            output.extend(self.link(group));
        }
        output
    }

    fn explicit_response(
        &self,
        records: &[MessageRecord],
        consumed: &[bool],
        current: usize,
    ) -> Option<usize> {
        let instruction = &records[current];
        (current + 1..records.len())
            .find(|&index| !consumed[index] && instruction.is_replied_by(&records[index]))
    }

    fn implicit_response(
        &self,
        records: &[MessageRecord],
        consumed: &[bool],
        current: usize,
    ) -> Option<usize> {
        let next = current + 1;
        if next >= records.len() || consumed[next] {
            return None;
        }

        let instruction = &records[current];
        let candidate = &records[next];
        let in_window = candidate
            .time
            .checked_sub(instruction.time)
            .is_some_and(|gap| gap < self.time_window_secs);
        let other_author = candidate.user_id != instruction.user_id;

        (in_window
            && other_author
            && !self
                .scorer
                .is_repeater(&instruction.content, &candidate.content))
        .then_some(next)
    }
}
