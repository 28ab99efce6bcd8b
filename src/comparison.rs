use crate::api::ComparisonReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchBy {
    #[default]
    Puuid,
    Username,
}

impl SearchBy {
    pub fn toggle(self) -> Self {
        match self {
            SearchBy::Puuid => SearchBy::Username,
            SearchBy::Username => SearchBy::Puuid,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SearchBy::Puuid => "PUUID",
            SearchBy::Username => "Username",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonRequest {
    pub game: String,
    pub search_by: SearchBy,
    pub identifier: String,
    pub rank: Option<String>,
}

impl ComparisonRequest {
    fn key(&self) -> (&str, Option<&str>) {
        (self.identifier.as_str(), self.rank.as_deref())
    }
}

/// Keeps the comparison report in step with the (identifier, rank) pair the
/// user is looking at: any change of that pair triggers exactly one request,
/// and responses for older pairs are dropped.
#[derive(Debug, Clone, Default)]
pub struct ComparisonTracker {
    current: Option<ComparisonRequest>,
    in_flight: Option<ComparisonRequest>,
    has_report: bool,
}

impl ComparisonTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Explicit submit: always fetches, and drops any loaded report.
    pub fn submit(
        &mut self,
        game: &str,
        search_by: SearchBy,
        identifier: &str,
        rank: Option<&str>,
    ) -> Option<ComparisonRequest> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return None;
        }
        let request = ComparisonRequest {
            game: game.to_string(),
            search_by,
            identifier: identifier.to_string(),
            rank: rank.map(str::to_string).filter(|r| !r.is_empty()),
        };
        self.has_report = false;
        self.issue(request)
    }

    /// Rank picked from the loaded report's list. Only refetches when a report
    /// is present and the pair actually changed.
    pub fn select_rank(&mut self, rank: &str) -> Option<ComparisonRequest> {
        if !self.has_report {
            return None;
        }
        let current = self.current.as_ref()?;
        let rank = Some(rank.to_string()).filter(|r| !r.is_empty());
        if current.rank == rank {
            return None;
        }
        let request = ComparisonRequest {
            rank,
            ..current.clone()
        };
        self.issue(request)
    }

    fn issue(&mut self, request: ComparisonRequest) -> Option<ComparisonRequest> {
        self.current = Some(request.clone());
        self.in_flight = Some(request.clone());
        Some(request)
    }

    /// Returns false when the response belongs to a superseded request.
    pub fn accept(&mut self, request: &ComparisonRequest, report: &ComparisonReport) -> bool {
        if !self.is_current(request) {
            return false;
        }
        self.in_flight = None;
        self.has_report = true;
        // No rank asked for: the server compared against the player's own rank.
        if let Some(current) = self.current.as_mut()
            && current.rank.is_none()
        {
            current.rank = report.target_player.rank.clone();
        }
        true
    }

    /// Returns false when the failure belongs to a superseded request.
    pub fn reject(&mut self, request: &ComparisonRequest) -> bool {
        if !self.is_current(request) {
            return false;
        }
        self.in_flight = None;
        self.has_report = false;
        true
    }

    fn is_current(&self, request: &ComparisonRequest) -> bool {
        self.in_flight
            .as_ref()
            .is_some_and(|pending| pending == request)
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn current(&self) -> Option<&ComparisonRequest> {
        self.current.as_ref()
    }

    pub fn selected_rank(&self) -> Option<&str> {
        self.current.as_ref().and_then(|c| c.key().1)
    }
}
