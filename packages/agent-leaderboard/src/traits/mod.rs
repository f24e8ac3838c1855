//! Collaborator traits: page fetching and web search.

pub mod fetcher;
pub mod searcher;
