pub mod parallel;
pub mod sequential;

pub use parallel::ParallelAnimationGroup;
pub use sequential::SequentialAnimationGroup;

use tracing::warn;

use crate::animation::Animation;

/// Stable identity of a child slot, unaffected by sibling insertions and
/// removals.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChildId(u64);

#[derive(Debug)]
struct Entry {
    id: ChildId,
    animation: Box<dyn Animation>,
}

/// Ordered, owning child list shared by both group kinds.
///
/// Every insert or remove bumps `generation`, letting a cursor derived
/// from an earlier shape of the list detect that its index may no longer
/// point where it used to.
#[derive(Debug, Default)]
pub(crate) struct AnimationList {
    entries: Vec<Entry>,
    generation: u64,
    next_id: u64,
}

impl AnimationList {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn id_at(&self, index: usize) -> Option<ChildId> {
        self.entries.get(index).map(|entry| entry.id)
    }

    pub(crate) fn index_of(&self, id: ChildId) -> Option<usize> {
        self.entries.iter().position(|entry| entry.id == id)
    }

    pub(crate) fn get(&self, index: usize) -> Option<&dyn Animation> {
        self.entries.get(index).map(|entry| entry.animation.as_ref())
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut Box<dyn Animation>> {
        self.entries.get_mut(index).map(|entry| &mut entry.animation)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (ChildId, &dyn Animation)> {
        self.entries
            .iter()
            .map(|entry| (entry.id, entry.animation.as_ref()))
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (ChildId, &mut Box<dyn Animation>)> {
        self.entries
            .iter_mut()
            .map(|entry| (entry.id, &mut entry.animation))
    }

    /// Inserts at `index`, clamped into the valid range. Returns the new
    /// child's stable id.
    pub(crate) fn insert(&mut self, index: usize, animation: Box<dyn Animation>) -> ChildId {
        let index = if index > self.entries.len() {
            warn!(index, len = self.entries.len(), "child index out of range, appending");
            self.entries.len()
        } else {
            index
        };
        let id = ChildId(self.next_id);
        self.next_id += 1;
        self.generation += 1;
        self.entries.insert(index, Entry { id, animation });
        id
    }

    pub(crate) fn push(&mut self, animation: Box<dyn Animation>) -> ChildId {
        self.insert(self.entries.len(), animation)
    }

    pub(crate) fn remove(&mut self, index: usize) -> Option<(ChildId, Box<dyn Animation>)> {
        if index >= self.entries.len() {
            warn!(index, len = self.entries.len(), "no child at index to remove");
            return None;
        }
        self.generation += 1;
        let entry = self.entries.remove(index);
        Some((entry.id, entry.animation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pause::PauseAnimation;

    #[test]
    fn ids_survive_sibling_mutation() {
        let mut list = AnimationList::new();
        let a = list.push(Box::new(PauseAnimation::new(10)));
        let b = list.push(Box::new(PauseAnimation::new(20)));
        let before = list.generation();

        list.insert(0, Box::new(PauseAnimation::new(5)));
        assert_eq!(list.index_of(a), Some(1));
        assert_eq!(list.index_of(b), Some(2));
        assert!(list.generation() > before, "mutation must move the generation");

        let (removed, _) = list.remove(1).unwrap();
        assert_eq!(removed, a);
        assert_eq!(list.index_of(b), Some(1));
        assert_eq!(list.index_of(a), None);
    }

    #[test]
    fn out_of_range_ops_are_clamped_or_refused() {
        let mut list = AnimationList::new();
        list.insert(7, Box::new(PauseAnimation::new(10)));
        assert_eq!(list.len(), 1);
        assert!(list.remove(3).is_none());
        assert_eq!(list.len(), 1);
    }
}
