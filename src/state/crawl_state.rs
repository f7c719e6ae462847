//! Per-job crawl state: frontier, queued set and visited set

use crate::state::PageState;
use crate::url::{CanonicalUrl, Origin};
use std::collections::{HashMap, HashSet, VecDeque};

/// Frontier and visited set of one crawl
///
/// Keys are page identities (see [`crate::url::normalize_identity`]). A URL
/// enters the frontier at most once: `enqueue` checks both the visited set
/// and the identities currently queued. A URL is marked visited exactly once,
/// by the engine, right before it is fetched.
#[derive(Debug)]
pub struct CrawlState {
    origin: Origin,
    visited: HashSet<String>,
    queued: HashSet<String>,
    frontier: VecDeque<CanonicalUrl>,
    states: HashMap<String, PageState>,
    discovery_order: Vec<String>,
}

impl CrawlState {
    pub fn new(origin: Origin) -> Self {
        Self {
            origin,
            visited: HashSet::new(),
            queued: HashSet::new(),
            frontier: VecDeque::new(),
            states: HashMap::new(),
            discovery_order: Vec::new(),
        }
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Appends a URL to the frontier unless its identity is already known
    ///
    /// Query and fragment are dropped before queueing.
    ///
    /// # Returns
    ///
    /// `true` if the URL was added
    pub fn enqueue(&mut self, url: CanonicalUrl) -> bool {
        let identity = url.identity();
        if self.visited.contains(&identity) || self.queued.contains(&identity) {
            return false;
        }

        self.queued.insert(identity.clone());
        self.set_state_by_identity(identity, PageState::Queued);
        self.frontier.push_back(url.without_suffix());
        true
    }

    /// Removes and returns the head of the frontier
    pub fn pop(&mut self) -> Option<CanonicalUrl> {
        let url = self.frontier.pop_front()?;
        self.queued.remove(&url.identity());
        Some(url)
    }

    /// Marks a URL visited
    ///
    /// # Returns
    ///
    /// `false` if it had already been visited, in which case it must not be
    /// fetched again
    pub fn mark_visited(&mut self, url: &CanonicalUrl) -> bool {
        let identity = url.identity();
        if !self.visited.insert(identity.clone()) {
            return false;
        }
        self.set_state_by_identity(identity, PageState::Fetching);
        true
    }

    pub fn is_visited(&self, url: &CanonicalUrl) -> bool {
        self.visited.contains(&url.identity())
    }

    /// True when the identity is visited or waiting in the frontier
    pub fn is_known(&self, url: &CanonicalUrl) -> bool {
        let identity = url.identity();
        self.visited.contains(&identity) || self.queued.contains(&identity)
    }

    pub fn set_state(&mut self, url: &CanonicalUrl, state: PageState) {
        self.set_state_by_identity(url.identity(), state);
    }

    pub fn state_of(&self, url: &CanonicalUrl) -> Option<PageState> {
        self.states.get(&url.identity()).copied()
    }

    /// Marks everything still queued as skipped because of the page cap
    pub fn drain_capped(&mut self) -> usize {
        let remaining: Vec<CanonicalUrl> = self.frontier.drain(..).collect();
        for url in &remaining {
            let identity = url.identity();
            self.queued.remove(&identity);
            self.set_state_by_identity(identity, PageState::CapReached);
        }
        remaining.len()
    }

    pub fn frontier_len(&self) -> usize {
        self.frontier.len()
    }

    pub fn visited_len(&self) -> usize {
        self.visited.len()
    }

    pub fn is_exhausted(&self) -> bool {
        self.frontier.is_empty()
    }

    /// Every page identity with its state, in discovery order
    pub fn outcomes(&self) -> Vec<(String, PageState)> {
        self.discovery_order
            .iter()
            .filter_map(|id| self.states.get(id).map(|s| (id.clone(), *s)))
            .collect()
    }

    fn set_state_by_identity(&mut self, identity: String, state: PageState) {
        if !self.states.contains_key(&identity) {
            self.discovery_order.push(identity.clone());
        }
        self.states.insert(identity, state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> CanonicalUrl {
        CanonicalUrl::parse(s).unwrap()
    }

    fn state() -> CrawlState {
        CrawlState::new(Origin::of(url("https://example.com/").as_url()).unwrap())
    }

    #[test]
    fn test_enqueue_once() {
        let mut state = state();
        assert!(state.enqueue(url("https://example.com/about")));
        assert!(!state.enqueue(url("https://example.com/about/")));
        assert!(!state.enqueue(url("https://example.com/about?x=1#y")));
        assert_eq!(state.frontier_len(), 1);
    }

    #[test]
    fn test_visited_blocks_requeue() {
        let mut state = state();
        state.enqueue(url("https://example.com/a"));

        let next = state.pop().unwrap();
        assert!(state.mark_visited(&next));
        assert!(!state.mark_visited(&next));
        assert!(!state.enqueue(url("https://example.com/a/")));
        assert!(state.is_exhausted());
    }

    #[test]
    fn test_queue_is_fifo_and_stripped() {
        let mut state = state();
        state.enqueue(url("https://example.com/1?utm=x"));
        state.enqueue(url("https://example.com/2#frag"));

        assert_eq!(state.pop().unwrap().as_str(), "https://example.com/1");
        assert_eq!(state.pop().unwrap().as_str(), "https://example.com/2");
        assert!(state.pop().is_none());
    }

    #[test]
    fn test_states_and_outcomes() {
        let mut state = state();
        state.enqueue(url("https://example.com/"));
        state.enqueue(url("https://example.com/gone"));
        state.enqueue(url("https://example.com/later"));

        let root = state.pop().unwrap();
        state.mark_visited(&root);
        state.set_state(&root, PageState::Fetched);

        let gone = state.pop().unwrap();
        state.mark_visited(&gone);
        state.set_state(&gone, PageState::NotFound);

        assert_eq!(state.drain_capped(), 1);

        let outcomes = state.outcomes();
        assert_eq!(
            outcomes,
            vec![
                ("https://example.com/".to_string(), PageState::Fetched),
                ("https://example.com/gone".to_string(), PageState::NotFound),
                ("https://example.com/later".to_string(), PageState::CapReached),
            ]
        );
        assert_eq!(state.visited_len(), 2);
    }
}
