use anyhow::Result;

/// Which list endpoint a browsing session is reading from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Players,
    Matches,
    PlayerHistory,
}

/// Identifies one logical list query. Two fetches belong to the same session
/// iff both the kind and the scope key (non-pagination parameters) match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryIdentity {
    pub kind: QueryKind,
    pub scope_key: String,
}

impl QueryIdentity {
    pub fn new(kind: QueryKind, scope_key: impl Into<String>) -> Self {
        Self {
            kind,
            scope_key: scope_key.into(),
        }
    }
}

/// One page as returned by a loader.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub has_more: bool,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            has_more: false,
        }
    }
}

/// Accumulated results for the live query.
#[derive(Debug, Clone, PartialEq)]
pub struct PageState<T> {
    pub identity: QueryIdentity,
    pub items: Vec<T>,
    pub cursor: usize,
    pub has_more: bool,
}

impl<T> PageState<T> {
    fn fresh(identity: QueryIdentity) -> Self {
        Self {
            identity,
            items: Vec::new(),
            cursor: 0,
            has_more: false,
        }
    }
}

/// Handle for a request started with [`QueryCache::begin`]. Only the most
/// recently issued ticket can be completed; older ones are stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub identity: QueryIdentity,
    pub offset: usize,
    seq: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Stale,
}

/// Single-slot cache behind every list view. Holds at most one [`PageState`]
/// and reconciles incoming pages into it.
#[derive(Debug, Clone)]
pub struct QueryCache<T> {
    page: Option<PageState<T>>,
    pending: Option<FetchTicket>,
    next_seq: u64,
}

impl<T> Default for QueryCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> QueryCache<T> {
    pub fn new() -> Self {
        Self {
            page: None,
            pending: None,
            next_seq: 0,
        }
    }

    /// Runs `loader` inline and reconciles its page. Returns the full
    /// accumulated list and the continuation flag.
    pub fn fetch_page<F>(
        &mut self,
        identity: QueryIdentity,
        requested_offset: usize,
        loader: F,
    ) -> Result<(&[T], bool)>
    where
        F: FnOnce(&QueryIdentity, usize) -> Result<Page<T>>,
    {
        let ticket = self.begin(identity, requested_offset);
        let outcome = loader(&ticket.identity, ticket.offset);
        self.complete(&ticket, outcome)?;
        Ok((self.items(), self.has_more()))
    }

    /// Starts a fetch. Resets the live state when the offset is zero or the
    /// identity differs from the one being accumulated.
    pub fn begin(&mut self, identity: QueryIdentity, requested_offset: usize) -> FetchTicket {
        let reset = requested_offset == 0
            || self
                .page
                .as_ref()
                .map(|page| page.identity != identity)
                .unwrap_or(true);
        if reset {
            self.page = Some(PageState::fresh(identity.clone()));
        }

        self.next_seq = self.next_seq.wrapping_add(1);
        let ticket = FetchTicket {
            identity,
            offset: requested_offset,
            seq: self.next_seq,
        };
        self.pending = Some(ticket.clone());
        ticket
    }

    /// Applies the result of a fetch started with [`QueryCache::begin`].
    ///
    /// A ticket that has been superseded yields `Ok(Outcome::Stale)` and leaves
    /// the live state alone, whether the late result succeeded or failed.
    /// A current failure clears everything and hands the error back.
    pub fn complete<E>(
        &mut self,
        ticket: &FetchTicket,
        outcome: std::result::Result<Page<T>, E>,
    ) -> std::result::Result<Outcome, E> {
        if self.pending.as_ref() != Some(ticket) {
            return Ok(Outcome::Stale);
        }
        self.pending = None;

        let page = match outcome {
            Ok(page) => page,
            Err(err) => {
                self.page = None;
                return Err(err);
            }
        };

        let state = self
            .page
            .get_or_insert_with(|| PageState::fresh(ticket.identity.clone()));
        if ticket.offset == 0 {
            state.items.clear();
            state.cursor = 0;
        }
        state.cursor += page.items.len();
        state.items.extend(page.items);
        state.has_more = page.has_more;
        debug_assert_eq!(state.items.len(), state.cursor);
        Ok(Outcome::Applied)
    }

    /// Drops the live state and forgets any pending request.
    pub fn clear(&mut self) {
        self.page = None;
        self.pending = None;
    }

    pub fn state(&self) -> Option<&PageState<T>> {
        self.page.as_ref()
    }

    pub fn identity(&self) -> Option<&QueryIdentity> {
        self.page.as_ref().map(|page| &page.identity)
    }

    pub fn items(&self) -> &[T] {
        self.page
            .as_ref()
            .map(|page| page.items.as_slice())
            .unwrap_or(&[])
    }

    pub fn cursor(&self) -> usize {
        self.page.as_ref().map(|page| page.cursor).unwrap_or(0)
    }

    pub fn next_offset(&self) -> usize {
        self.cursor()
    }

    pub fn has_more(&self) -> bool {
        self.page.as_ref().is_some_and(|page| page.has_more)
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    /// "Load more" is only offered when the server said there is more and no
    /// request is outstanding.
    pub fn can_load_more(&self) -> bool {
        self.has_more() && !self.is_loading()
    }

    pub fn pending(&self) -> Option<&FetchTicket> {
        self.pending.as_ref()
    }
}
