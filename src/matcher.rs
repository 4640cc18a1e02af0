//! Decides which configured locations want a discovered repository.

use regex::Regex;
use tracing::warn;

use crate::config::Location;
use crate::discovery::RemoteRepo;

/// Does `location` want `repo`?
///
/// The pattern is searched anywhere in the URL, not anchored. An invalid
/// pattern is logged and never matches. This compiles the pattern on every
/// call; [`LocationMatcher`] compiles once per run.
pub fn wants(location: &Location, repo: &RemoteRepo) -> bool {
    match Regex::new(&location.repository) {
        Ok(pattern) => pattern.is_match(&repo.url),
        Err(e) => {
            warn!("Unable to match regex '{}': {}", location.repository, e);
            false
        }
    }
}

/// Locations with their patterns compiled up front, in configuration order
pub struct LocationMatcher {
    locations: Vec<(Location, Option<Regex>)>,
}

impl LocationMatcher {
    /// Compile every location's pattern, reporting each invalid one once
    pub fn new(locations: &[Location]) -> Self {
        let locations = locations
            .iter()
            .map(|location| {
                let pattern = match Regex::new(&location.repository) {
                    Ok(pattern) => Some(pattern),
                    Err(e) => {
                        warn!(
                            "Ignoring location {}: invalid pattern '{}': {}",
                            location.directory, location.repository, e
                        );
                        None
                    }
                };
                (location.clone(), pattern)
            })
            .collect();

        Self { locations }
    }

    /// Locations that want `repo`, in configuration order
    pub fn matching<'a>(
        &'a self,
        repo: &'a RemoteRepo,
    ) -> impl Iterator<Item = &'a Location> + 'a {
        self.locations
            .iter()
            .filter(move |(_, pattern)| {
                pattern
                    .as_ref()
                    .is_some_and(|pattern| pattern.is_match(&repo.url))
            })
            .map(|(location, _)| location)
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}
