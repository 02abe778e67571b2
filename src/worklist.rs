use crate::grid::Site;
use crate::settings::WorklistDiscipline;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;

/// Pending unstable sites for one relaxation wave.
///
/// Entries are speculative: a site may be stable again by the time it is
/// popped, and duplicates are allowed unless deduplication is enabled.
pub struct Worklist {
    discipline: WorklistDiscipline,
    items: VecDeque<Site>,
    /// Per-site "already pending" tags, present when deduplicating
    pending: Option<Vec<bool>>,
    side: usize,
    rng: StdRng,
}

impl Worklist {
    pub fn new(side: usize, discipline: WorklistDiscipline, dedup: bool, seed: u64) -> Self {
        Self {
            discipline,
            items: VecDeque::new(),
            pending: dedup.then(|| vec![false; side * side]),
            side,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Schedule a site. With deduplication a site already waiting in this
    /// list is not added twice.
    pub fn push(&mut self, site: Site) {
        if let Some(pending) = self.pending.as_mut() {
            let idx = site.row * self.side + site.col;
            if pending[idx] {
                return;
            }
            pending[idx] = true;
        }
        self.items.push_back(site);
    }

    pub fn pop(&mut self) -> Option<Site> {
        let site = match self.discipline {
            WorklistDiscipline::Stack => self.items.pop_back(),
            WorklistDiscipline::Queue => self.items.pop_front(),
            WorklistDiscipline::Shuffled => {
                if self.items.is_empty() {
                    None
                } else {
                    let i = self.rng.gen_range(0..self.items.len());
                    self.items.swap_remove_back(i)
                }
            }
        }?;
        if let Some(pending) = self.pending.as_mut() {
            pending[site.row * self.side + site.col] = false;
        }
        Some(site)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
