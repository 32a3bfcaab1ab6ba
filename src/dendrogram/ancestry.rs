use super::StructureId;
use std::collections::HashMap;

///
/// Maps every live structure to the top-most branch containing it, or to
/// `None` while the structure is still a root. Only needed during
/// construction; the finished tree owns children by value and has no
/// upward links.
///
#[derive(Debug, Default)]
pub struct AncestorMap {
    ancestors: HashMap<StructureId, Option<StructureId>>,
}

impl AncestorMap {
    /// Registers a freshly created structure as its own root
    #[inline]
    pub fn insert_root(&mut self, id: StructureId) {
        self.ancestors.insert(id, None);
    }

    /// Terminal id of the ancestor chain starting at `id`
    pub fn resolve(&self, id: StructureId) -> StructureId {
        let mut current = id;
        let mut steps = 0;

        while let Some(Some(next)) = self.ancestors.get(&current) {
            current = *next;
            steps += 1;
            assert!(
                steps <= self.ancestors.len(),
                "ancestor chain starting at {} does not terminate",
                id
            );
        }

        current
    }

    /// Redirects `old_root` and every entry currently resolving to it to
    /// `new_root`, keeping chains one step deep.
    pub fn reparent(&mut self, old_root: StructureId, new_root: StructureId) {
        for ancestor in self.ancestors.values_mut() {
            if *ancestor == Some(old_root) {
                *ancestor = Some(new_root);
            }
        }

        self.ancestors.insert(old_root, Some(new_root));
    }

    /// Drops the entry of a structure that was merged away
    #[inline]
    pub fn retire(&mut self, id: StructureId) {
        self.ancestors.remove(&id);
    }

    #[inline]
    pub fn is_root(&self, id: StructureId) -> bool {
        matches!(self.ancestors.get(&id), Some(None))
    }
}
