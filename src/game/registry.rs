//! Entity Registry
//!
//! Owns every live actor. Master collection plus a per-category index,
//! both BTreeMaps so iteration order is deterministic for a given state.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use crate::core::hash::{StateHash, compute_state_hash};
use crate::core::vec2::{Vec2, Rect};
use crate::game::actor::{Actor, ActorId, Category};
use crate::game::spatial::SpatialGrid;

/// Registry handle shared between subsystems on the simulation thread.
pub type SharedRegistry = Rc<RefCell<EntityRegistry>>;

/// Owns all live actors and answers type and proximity queries.
#[derive(Clone, Debug)]
pub struct EntityRegistry {
    /// Master collection
    actors: BTreeMap<ActorId, Actor>,
    /// Category index; every id here is also in `actors`
    by_type: BTreeMap<Category, BTreeSet<ActorId>>,
    /// Proximity index, refreshed by `rebuild_spatial`
    spatial: SpatialGrid,
    /// Next id to hand out
    next_id: u64,
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityRegistry {
    /// Empty registry with the default grid cell size.
    pub fn new() -> Self {
        Self::with_cell_size(crate::game::spatial::DEFAULT_CELL_SIZE)
    }

    /// Empty registry with a custom grid cell size.
    pub fn with_cell_size(cell_size: f32) -> Self {
        Self {
            actors: BTreeMap::new(),
            by_type: BTreeMap::new(),
            spatial: SpatialGrid::new(cell_size),
            next_id: 1,
        }
    }

    /// Wrap in a shared handle.
    pub fn shared(self) -> SharedRegistry {
        Rc::new(RefCell::new(self))
    }

    // =========================================================================
    // MUTATION
    // =========================================================================

    /// Insert an actor, assigning it a fresh id.
    pub fn add(&mut self, mut actor: Actor) -> ActorId {
        let id = ActorId(self.next_id);
        self.next_id += 1;

        actor.id = id;
        self.by_type.entry(actor.category).or_default().insert(id);
        self.spatial.insert(id, actor.position);
        self.actors.insert(id, actor);
        id
    }

    /// Remove an actor from the collection and the index.
    ///
    /// Removing an absent id is a no-op and returns `None`.
    pub fn remove(&mut self, id: ActorId) -> Option<Actor> {
        let actor = self.actors.remove(&id)?;
        if let Some(set) = self.by_type.get_mut(&actor.category) {
            set.remove(&id);
            if set.is_empty() {
                self.by_type.remove(&actor.category);
            }
        }
        Some(actor)
    }

    /// Write back an updated copy of an actor.
    ///
    /// Ignored if the actor was removed in the meantime. The category is
    /// owned by the registry and cannot change through this path.
    pub fn replace(&mut self, actor: Actor) -> bool {
        match self.actors.get_mut(&actor.id) {
            Some(slot) if slot.category == actor.category => {
                *slot = actor;
                true
            }
            _ => false,
        }
    }

    /// Remove every inactive actor. Returns the removed ids.
    pub fn sweep_inactive(&mut self) -> Vec<ActorId> {
        let dead: Vec<ActorId> = self
            .actors
            .values()
            .filter(|a| !a.active)
            .map(|a| a.id)
            .collect();
        for id in &dead {
            self.remove(*id);
        }
        dead
    }

    /// Refresh the spatial index from current positions.
    pub fn rebuild_spatial(&mut self) {
        let entries: Vec<(ActorId, Vec2)> =
            self.actors.values().map(|a| (a.id, a.position)).collect();
        self.spatial.rebuild(entries);
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Look up an actor.
    pub fn get(&self, id: ActorId) -> Option<&Actor> {
        self.actors.get(&id)
    }

    /// Look up an actor mutably.
    pub fn get_mut(&mut self, id: ActorId) -> Option<&mut Actor> {
        self.actors.get_mut(&id)
    }

    /// Whether the id is live.
    pub fn contains(&self, id: ActorId) -> bool {
        self.actors.contains_key(&id)
    }

    /// Number of actors.
    pub fn len(&self) -> usize {
        self.actors.len()
    }

    /// No actors.
    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    /// Every live actor, in id order.
    pub fn all(&self) -> impl Iterator<Item = &Actor> {
        self.actors.values()
    }

    /// Snapshot of all ids, in id order.
    pub fn ids(&self) -> Vec<ActorId> {
        self.actors.keys().copied().collect()
    }

    /// All actors of a category (empty if none).
    pub fn by_type(&self, category: Category) -> impl Iterator<Item = &Actor> {
        self.by_type
            .get(&category)
            .into_iter()
            .flat_map(|set| set.iter())
            .filter_map(move |id| self.actors.get(id))
    }

    /// Snapshot of the ids of a category.
    pub fn ids_by_type(&self, category: Category) -> Vec<ActorId> {
        self.by_type
            .get(&category)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// First live hero.
    pub fn hero(&self) -> Option<&Actor> {
        self.by_type(Category::Hero).find(|a| a.is_alive())
    }

    /// Actors within `radius` of `point`, via the spatial index.
    ///
    /// Candidates come from the last rebuild but are checked against current
    /// positions, so moved or removed actors never produce false hits.
    pub fn query_radius(&self, point: Vec2, radius: f32) -> Vec<&Actor> {
        self.spatial
            .candidates_in_circle(point, radius)
            .into_iter()
            .filter_map(|id| self.actors.get(&id))
            .filter(|a| a.position.within(point, radius))
            .collect()
    }

    /// Actors inside `rect`, via the spatial index.
    pub fn query_rect(&self, rect: Rect) -> Vec<&Actor> {
        self.spatial
            .candidates_in_rect(rect)
            .into_iter()
            .filter_map(|id| self.actors.get(&id))
            .filter(|a| rect.contains(a.position))
            .collect()
    }

    /// Linear scan for actors within `radius`, optionally of one category.
    ///
    /// Does not depend on the spatial index being fresh.
    pub fn in_radius(&self, point: Vec2, radius: f32, category: Option<Category>) -> Vec<&Actor> {
        let within = |a: &&Actor| a.position.within(point, radius);
        match category {
            Some(cat) => self.by_type(cat).filter(within).collect(),
            None => self.actors.values().filter(within).collect(),
        }
    }

    /// Hash of ids, positions, health and behavior mode.
    pub fn state_hash(&self, frame: u64) -> StateHash {
        compute_state_hash(frame, |hasher| {
            hasher.write(&(self.actors.len() as u32));
            for actor in self.actors.values() {
                actor.hash_into(hasher);
            }
        })
    }

    /// Check that every indexed id is in the master collection and vice versa.
    pub fn index_consistent(&self) -> bool {
        let indexed: usize = self.by_type.values().map(BTreeSet::len).sum();
        indexed == self.actors.len()
            && self.by_type.iter().all(|(cat, ids)| {
                ids.iter()
                    .all(|id| self.actors.get(id).is_some_and(|a| a.category == *cat))
            })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn enemy_at(x: f32, y: f32) -> Actor {
        Actor::new(Category::EnemyDinosaur, Vec2::new(x, y))
    }

    #[test]
    fn test_add_assigns_unique_ids() {
        let mut reg = EntityRegistry::new();
        let a = reg.add(enemy_at(0.0, 0.0));
        let b = reg.add(enemy_at(1.0, 0.0));

        assert_ne!(a, b);
        assert_eq!(reg.get(a).unwrap().id, a);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut reg = EntityRegistry::new();
        let id = reg.add(enemy_at(0.0, 0.0));

        assert!(reg.remove(id).is_some());
        assert!(reg.remove(id).is_none());
        assert_eq!(reg.by_type(Category::EnemyDinosaur).count(), 0);
        assert!(reg.index_consistent());
    }

    #[test]
    fn test_by_type_empty_category() {
        let reg = EntityRegistry::new();
        assert_eq!(reg.by_type(Category::Boss).count(), 0);
        assert!(reg.ids_by_type(Category::Npc).is_empty());
    }

    #[test]
    fn test_sweep_inactive() {
        let mut reg = EntityRegistry::new();
        let keep = reg.add(enemy_at(0.0, 0.0));
        let drop = reg.add(enemy_at(5.0, 0.0));
        reg.get_mut(drop).unwrap().active = false;

        assert_eq!(reg.sweep_inactive(), vec![drop]);
        assert!(reg.contains(keep));
        assert!(!reg.contains(drop));
    }

    #[test]
    fn test_query_radius_uses_current_positions() {
        let mut reg = EntityRegistry::new();
        let near = reg.add(enemy_at(10.0, 0.0));
        let far = reg.add(enemy_at(1000.0, 0.0));
        reg.rebuild_spatial();

        let hits: Vec<ActorId> = reg.query_radius(Vec2::ZERO, 50.0).iter().map(|a| a.id).collect();
        assert_eq!(hits, vec![near]);

        // Moved after the rebuild: no stale hit
        reg.get_mut(near).unwrap().position = Vec2::new(500.0, 0.0);
        assert!(reg.query_radius(Vec2::ZERO, 50.0).is_empty());

        // Removed after the rebuild: no dangling hit
        reg.remove(far);
        assert!(reg.query_radius(Vec2::new(1000.0, 0.0), 10.0).is_empty());
    }

    #[test]
    fn test_query_radius_with_huge_radius() {
        let mut reg = EntityRegistry::new();
        let only = reg.add(enemy_at(10.0, 0.0));
        reg.rebuild_spatial();

        let hits: Vec<ActorId> = reg.query_radius(Vec2::ZERO, 1.0e7).iter().map(|a| a.id).collect();
        assert_eq!(hits, vec![only]);
        assert_eq!(reg.query_radius(Vec2::ZERO, f32::INFINITY).len(), 1);
    }

    #[test]
    fn test_query_rect_and_in_radius() {
        let mut reg = EntityRegistry::new();
        let a = reg.add(enemy_at(10.0, 10.0));
        reg.add(Actor::new(Category::Prop, Vec2::new(12.0, 12.0)));
        reg.rebuild_spatial();

        assert_eq!(reg.query_rect(Rect::new(0.0, 0.0, 20.0, 20.0)).len(), 2);

        let enemies = reg.in_radius(Vec2::new(10.0, 10.0), 5.0, Some(Category::EnemyDinosaur));
        assert_eq!(enemies.len(), 1);
        assert_eq!(enemies[0].id, a);
    }

    #[test]
    fn test_replace_ignores_removed_actor() {
        let mut reg = EntityRegistry::new();
        let id = reg.add(enemy_at(0.0, 0.0));
        let mut copy = reg.get(id).unwrap().clone();
        copy.position = Vec2::new(3.0, 4.0);

        assert!(reg.replace(copy.clone()));
        assert_eq!(reg.get(id).unwrap().position, Vec2::new(3.0, 4.0));

        reg.remove(id);
        assert!(!reg.replace(copy));
        assert!(!reg.contains(id));
    }

    #[test]
    fn test_state_hash_tracks_positions() {
        let mut reg = EntityRegistry::new();
        let id = reg.add(enemy_at(0.0, 0.0));
        let before = reg.state_hash(1);

        reg.get_mut(id).unwrap().position = Vec2::new(1.0, 0.0);
        assert_ne!(before, reg.state_hash(1));
    }

    #[derive(Clone, Debug)]
    enum Op {
        Add(u8),
        Remove(u8),
        Deactivate(u8),
        Sweep,
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..7).prop_map(Op::Add),
            any::<u8>().prop_map(Op::Remove),
            any::<u8>().prop_map(Op::Deactivate),
            Just(Op::Sweep),
        ]
    }

    fn category_from(n: u8) -> Category {
        match n % 7 {
            0 => Category::Hero,
            1 => Category::EnemyDinosaur,
            2 => Category::EnemySoldier,
            3 => Category::Boss,
            4 => Category::Npc,
            5 => Category::DroppedItem,
            _ => Category::Prop,
        }
    }

    proptest! {
        #[test]
        fn prop_by_type_is_subset_of_all(ops in proptest::collection::vec(op_strategy(), 0..64)) {
            let mut reg = EntityRegistry::new();
            for op in ops {
                match op {
                    Op::Add(c) => { reg.add(Actor::new(category_from(c), Vec2::ZERO)); }
                    Op::Remove(n) => { reg.remove(ActorId(n as u64)); }
                    Op::Deactivate(n) => {
                        if let Some(a) = reg.get_mut(ActorId(n as u64)) { a.active = false; }
                    }
                    Op::Sweep => { reg.sweep_inactive(); }
                }

                let all: BTreeSet<ActorId> = reg.all().map(|a| a.id).collect();
                for c in 0..7u8 {
                    let cat = category_from(c);
                    for actor in reg.by_type(cat) {
                        prop_assert!(all.contains(&actor.id));
                        prop_assert_eq!(actor.category, cat);
                    }
                }
                prop_assert!(reg.index_consistent());
            }
        }
    }
}
