use log::{debug, info, warn};
use snafu::OptionExt;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::config::{CatalogRefresh, Position};
use crate::errors::{CatalogError, NotConfiguredSnafu};

/// The candidates of one position, grouped by subcategory.
///
/// Subcategories and candidates keep the order of the source. Blank entries
/// and subcategories without any candidate are dropped, nothing else: a name
/// listed twice stays listed twice.
///
/// A subcategory label used twice is suffixed on its later uses (`Team1`,
/// `Team1.1`, `Team1.2`), so that every column can be selected.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct Catalog {
    groups: Vec<(String, Vec<String>)>,
}

impl Catalog {
    pub fn new(groups: Vec<(String, Vec<String>)>) -> Catalog {
        let groups: Vec<(String, Vec<String>)> = groups
            .into_iter()
            .map(|(label, cands)| {
                let cands: Vec<String> = cands
                    .into_iter()
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty())
                    .collect();
                (label.trim().to_string(), cands)
            })
            .filter(|(_, cands)| !cands.is_empty())
            .collect();
        Catalog {
            groups: Catalog::unique_labels(groups),
        }
    }

    fn unique_labels(groups: Vec<(String, Vec<String>)>) -> Vec<(String, Vec<String>)> {
        let mut taken: HashSet<String> = groups.iter().map(|(l, _)| l.clone()).collect();
        let mut seen: HashSet<String> = HashSet::new();
        groups
            .into_iter()
            .map(|(label, cands)| {
                if seen.insert(label.clone()) {
                    return (label, cands);
                }
                let mut idx = 1;
                let mut renamed = format!("{}.{}", label, idx);
                while taken.contains(&renamed) {
                    idx += 1;
                    renamed = format!("{}.{}", label, idx);
                }
                debug!("Catalog: subcategory {} listed again as {}", label, renamed);
                taken.insert(renamed.clone());
                seen.insert(renamed.clone());
                (renamed, cands)
            })
            .collect()
    }

    pub fn subcategories(&self) -> Vec<&str> {
        self.groups.iter().map(|(label, _)| label.as_str()).collect()
    }

    pub fn candidates(&self, subcategory: &str) -> Option<&[String]> {
        self.groups
            .iter()
            .find(|(label, _)| label == subcategory)
            .map(|(_, cands)| cands.as_slice())
    }

    /// All the candidates of all the subcategories, for flat selection.
    pub fn pooled(&self) -> Vec<&str> {
        self.groups
            .iter()
            .flat_map(|(_, cands)| cands.iter().map(|c| c.as_str()))
            .collect()
    }

    pub fn contains(&self, candidate: &str) -> bool {
        self.groups
            .iter()
            .any(|(_, cands)| cands.iter().any(|c| c == candidate))
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Provides the catalog of a position. Implemented by the file readers of
/// the application, and by `StaticCandidates` for inline lists.
pub trait CandidateSource: Send + Sync {
    fn load(&self, position: &Position) -> Result<Catalog, CatalogError>;
}

/// Catalogs given directly, keyed by position name.
#[derive(Debug, Clone, Default)]
pub struct StaticCandidates {
    catalogs: HashMap<String, Catalog>,
}

impl StaticCandidates {
    pub fn new() -> StaticCandidates {
        StaticCandidates::default()
    }

    pub fn with(mut self, position: &str, catalog: Catalog) -> StaticCandidates {
        self.catalogs.insert(position.to_string(), catalog);
        self
    }
}

impl CandidateSource for StaticCandidates {
    fn load(&self, position: &Position) -> Result<Catalog, CatalogError> {
        self.catalogs
            .get(&position.name)
            .cloned()
            .context(NotConfiguredSnafu {
                position: &position.name,
            })
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum Availability {
    Ready(Catalog),
    /// The reason, suitable for display.
    Unavailable(String),
}

/// The catalogs of all the positions, read at one point in time.
///
/// A voting session holds on to one snapshot for its whole duration, so the
/// subcategory list and the candidates of a subcategory always agree.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CatalogSnapshot {
    entries: Vec<(String, Availability)>,
}

impl CatalogSnapshot {
    pub fn take(source: &dyn CandidateSource, positions: &[Position]) -> CatalogSnapshot {
        let entries = positions
            .iter()
            .map(|pos| {
                let availability = match source.load(pos) {
                    Ok(catalog) => {
                        debug!(
                            "CatalogSnapshot: {}: {} subcategories",
                            pos.name,
                            catalog.subcategories().len()
                        );
                        Availability::Ready(catalog)
                    }
                    Err(e) => {
                        warn!("CatalogSnapshot: {}: {:?}", pos.name, e);
                        Availability::Unavailable(e.to_string())
                    }
                };
                (pos.name.clone(), availability)
            })
            .collect();
        CatalogSnapshot { entries }
    }

    pub fn availability(&self, position: &str) -> Option<&Availability> {
        self.entries
            .iter()
            .find(|(name, _)| name == position)
            .map(|(_, a)| a)
    }

    /// The catalog of the position, if it could be read.
    pub fn catalog(&self, position: &str) -> Option<&Catalog> {
        match self.availability(position) {
            Some(Availability::Ready(catalog)) => Some(catalog),
            _ => None,
        }
    }

    /// True if every position could be read.
    pub fn is_complete(&self) -> bool {
        self.entries
            .iter()
            .all(|(_, a)| matches!(a, Availability::Ready(_)))
    }
}

/// Hands out snapshots according to the refresh policy.
pub struct CandidateCatalog {
    source: Box<dyn CandidateSource>,
    refresh: CatalogRefresh,
    cached: Mutex<Option<Arc<CatalogSnapshot>>>,
}

impl CandidateCatalog {
    pub fn new(source: Box<dyn CandidateSource>, refresh: CatalogRefresh) -> CandidateCatalog {
        CandidateCatalog {
            source,
            refresh,
            cached: Mutex::new(None),
        }
    }

    pub fn snapshot(&self, positions: &[Position]) -> Arc<CatalogSnapshot> {
        if self.refresh == CatalogRefresh::PerSession {
            return Arc::new(CatalogSnapshot::take(self.source.as_ref(), positions));
        }
        let mut cached = match self.cached.lock() {
            Ok(guard) => guard,
            Err(_) => return Arc::new(CatalogSnapshot::take(self.source.as_ref(), positions)),
        };
        if let Some(snapshot) = cached.as_ref() {
            return snapshot.clone();
        }
        let snapshot = Arc::new(CatalogSnapshot::take(self.source.as_ref(), positions));
        // Incomplete snapshots are retried at the next login.
        if snapshot.is_complete() {
            info!("CandidateCatalog: caching the candidate lists");
            *cached = Some(snapshot.clone());
        }
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn teams() -> Catalog {
        Catalog::new(vec![
            (
                "Team1".to_string(),
                vec!["Alice".to_string(), "".to_string(), "Bob".to_string()],
            ),
            ("Empty".to_string(), vec!["  ".to_string()]),
            (
                "Team2".to_string(),
                vec!["Carol".to_string(), "Alice".to_string()],
            ),
        ])
    }

    #[test]
    fn blanks_are_dropped_duplicates_kept() {
        let c = teams();
        assert_eq!(c.subcategories(), vec!["Team1", "Team2"]);
        assert_eq!(
            c.candidates("Team1").unwrap(),
            &["Alice".to_string(), "Bob".to_string()]
        );
        assert_eq!(c.candidates("Empty"), None);
        assert_eq!(c.pooled(), vec!["Alice", "Bob", "Carol", "Alice"]);
        assert!(c.contains("Carol"));
        assert!(!c.contains("Dave"));
    }

    #[test]
    fn repeated_subcategory_labels_stay_selectable() {
        let c = Catalog::new(vec![
            ("Team1".to_string(), vec!["Alice".to_string()]),
            ("Team1".to_string(), vec!["Bob".to_string()]),
            ("Team1.1".to_string(), vec!["Carol".to_string()]),
            ("Team1".to_string(), vec!["Dan".to_string()]),
        ]);
        assert_eq!(
            c.subcategories(),
            vec!["Team1", "Team1.2", "Team1.1", "Team1.3"]
        );
        assert_eq!(c.candidates("Team1").unwrap(), &["Alice".to_string()]);
        assert_eq!(c.candidates("Team1.2").unwrap(), &["Bob".to_string()]);
        assert_eq!(c.candidates("Team1.1").unwrap(), &["Carol".to_string()]);
        assert_eq!(c.candidates("Team1.3").unwrap(), &["Dan".to_string()]);
        assert_eq!(c.pooled(), vec!["Alice", "Bob", "Carol", "Dan"]);
    }

    #[test]
    fn missing_catalog_marks_position_unavailable() {
        let source = StaticCandidates::new().with("pozA", teams());
        let snap = CatalogSnapshot::take(
            &source,
            &[Position::two_step("pozA"), Position::flat("pozB")],
        );
        assert!(snap.catalog("pozA").is_some());
        assert!(snap.catalog("pozB").is_none());
        assert_eq!(
            snap.availability("pozB"),
            Some(&Availability::Unavailable(
                "No candidates available for pozB".to_string()
            ))
        );
        assert!(!snap.is_complete());
    }

    struct CountingSource {
        loads: Arc<AtomicUsize>,
    }

    impl CandidateSource for CountingSource {
        fn load(&self, _position: &Position) -> Result<Catalog, CatalogError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(teams())
        }
    }

    #[test]
    fn refresh_policies() {
        let positions = vec![Position::two_step("pozA")];

        let loads = Arc::new(AtomicUsize::new(0));
        let per_session = CandidateCatalog::new(
            Box::new(CountingSource {
                loads: loads.clone(),
            }),
            CatalogRefresh::PerSession,
        );
        per_session.snapshot(&positions);
        per_session.snapshot(&positions);
        assert_eq!(loads.load(Ordering::SeqCst), 2);

        let loads = Arc::new(AtomicUsize::new(0));
        let once = CandidateCatalog::new(
            Box::new(CountingSource {
                loads: loads.clone(),
            }),
            CatalogRefresh::Once,
        );
        let s1 = once.snapshot(&positions);
        let s2 = once.snapshot(&positions);
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&s1, &s2));
    }
}
