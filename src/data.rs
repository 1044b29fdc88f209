//! The read-only boundary over historical match facts. Persistence and ingestion are
//! external collaborators; the engine only ever sees bounded, filtered views.

use chrono::NaiveDate;

use crate::domain::{MatchRecord, Side};

/// Filter over historical matches. Results are ordered most-recent-first and capped
/// at `limit`.
#[derive(Clone, Debug, Default)]
pub struct MatchFilter {
    pub league: Option<String>,
    pub team: Option<TeamFilter>,
    pub since: Option<NaiveDate>,
    pub until: Option<NaiveDate>,
    pub limit: Option<usize>,
}
impl MatchFilter {
    pub fn for_league(league: &str) -> Self {
        Self {
            league: Some(league.to_string()),
            ..Self::default()
        }
    }

    pub fn team(mut self, name: &str, venue: Option<Side>) -> Self {
        self.team = Some(TeamFilter {
            name: name.to_string(),
            venue,
        });
        self
    }

    pub fn since(mut self, date: NaiveDate) -> Self {
        self.since = Some(date);
        self
    }

    pub fn until(mut self, date: NaiveDate) -> Self {
        self.until = Some(date);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, record: &MatchRecord) -> bool {
        if let Some(league) = &self.league {
            if &record.league != league {
                return false;
            }
        }
        if let Some(team) = &self.team {
            match record.side_of(&team.name) {
                None => return false,
                Some(side) => {
                    if let Some(venue) = team.venue {
                        if side != venue {
                            return false;
                        }
                    }
                }
            }
        }
        if let Some(since) = self.since {
            if record.date < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if record.date > until {
                return false;
            }
        }
        true
    }
}

#[derive(Clone, Debug)]
pub struct TeamFilter {
    pub name: String,
    pub venue: Option<Side>,
}

/// Query capability owned by the storage subsystem. Implementations must return
/// matches ordered most-recent-first, truncated to the filter's limit.
pub trait MatchSource {
    fn query(&self, filter: &MatchFilter) -> Vec<MatchRecord>;
}

/// Reference in-memory source, used in tests and by callers that already hold
/// their records.
#[derive(Clone, Debug, Default)]
pub struct InMemoryMatches {
    records: Vec<MatchRecord>,
}
impl InMemoryMatches {
    pub fn new(records: Vec<MatchRecord>) -> Self {
        Self { records }
    }

    pub fn push(&mut self, record: MatchRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl MatchSource for InMemoryMatches {
    fn query(&self, filter: &MatchFilter) -> Vec<MatchRecord> {
        let mut selected = self
            .records
            .iter()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect::<Vec<_>>();
        selected.sort_by(|a, b| b.date.cmp(&a.date));
        if let Some(limit) = filter.limit {
            selected.truncate(limit);
        }
        selected
    }
}
