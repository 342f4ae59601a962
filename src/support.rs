use crate::error::{Error, Result};
use crate::game_tree::*;

/// Subset of actions considered active at each information set.
///
/// Active actions of personal information sets are laid out in one flat vector,
/// ordered by player, then information set, then action. A behavior profile
/// stores its values with this same indexing. Chance information sets keep all
/// their actions and take no slots.
#[derive(Clone, Debug)]
pub struct BehaviorSupport<'a, G: GameTree> {
    game: &'a G,
    actions: Vec<Vec<ActionId>>,
    infosets: Vec<InfosetId>,
    layout: Vec<ActionId>,
    slots: Vec<Option<usize>>,
}

impl<'a, G: GameTree> BehaviorSupport<'a, G> {
    /// Returns the full support, in which every action is active.
    pub fn new(game: &'a G) -> Self {
        let actions = (0..game.num_infosets())
            .map(|iset| game.infoset_actions(InfosetId(iset)).to_vec())
            .collect();
        let mut ret = Self {
            game,
            actions,
            infosets: Vec::new(),
            layout: Vec::new(),
            slots: Vec::new(),
        };
        ret.rebuild_layout();
        ret
    }

    /// Builds a support from explicit per-infoset action lists.
    ///
    /// Fails with [`Error::MismatchedSupport`] when the lists do not line up with
    /// `game`: wrong number of infosets, an action filed under the wrong infoset,
    /// a duplicate, an empty personal infoset, or a restricted chance infoset.
    pub fn from_actions(game: &'a G, actions: Vec<Vec<ActionId>>) -> Result<Self> {
        if actions.len() != game.num_infosets() {
            return Err(Error::MismatchedSupport);
        }
        let mut sorted = Vec::with_capacity(actions.len());
        for (iset, mut active) in actions.into_iter().enumerate() {
            let iset = InfosetId(iset);
            if active.is_empty() {
                return Err(Error::MismatchedSupport);
            }
            if active
                .iter()
                .any(|&a| a.0 >= game.num_actions() || game.action_infoset(a) != iset)
            {
                return Err(Error::MismatchedSupport);
            }
            active.sort_by_key(|&a| game.action_number(a));
            active.dedup();
            let complete = active.len() == game.infoset_actions(iset).len();
            if game.is_chance(iset) && !complete {
                return Err(Error::MismatchedSupport);
            }
            sorted.push(active);
        }

        let mut ret = Self {
            game,
            actions: sorted,
            infosets: Vec::new(),
            layout: Vec::new(),
            slots: Vec::new(),
        };
        ret.rebuild_layout();
        Ok(ret)
    }

    fn rebuild_layout(&mut self) {
        let game = self.game;
        let mut infosets = (0..game.num_infosets())
            .map(InfosetId)
            .filter(|&iset| !game.is_chance(iset))
            .collect::<Vec<_>>();
        infosets.sort_by_key(|&iset| (game.infoset_player(iset).index(), iset));

        self.layout.clear();
        self.slots = vec![None; game.num_actions()];
        for &iset in &infosets {
            for &action in &self.actions[iset.0] {
                self.slots[action.0] = Some(self.layout.len());
                self.layout.push(action);
            }
        }
        self.infosets = infosets;
    }

    /// Deactivates `action`. Returns `false` if it was not active or is the last
    /// active action at its information set.
    pub fn remove_action(&mut self, action: ActionId) -> Result<bool> {
        let iset = self.game.action_infoset(action);
        if self.game.is_chance(iset) {
            return Err(Error::ChanceAction(action));
        }
        let active = &mut self.actions[iset.0];
        if active.len() <= 1 {
            return Ok(false);
        }
        match active.iter().position(|&a| a == action) {
            Some(pos) => {
                active.remove(pos);
                self.rebuild_layout();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    #[inline]
    pub fn game(&self) -> &'a G {
        self.game
    }

    /// Returns the active actions at `infoset`, in game order.
    #[inline]
    pub fn actions(&self, infoset: InfosetId) -> &[ActionId] {
        &self.actions[infoset.0]
    }

    #[inline]
    pub fn num_active(&self, infoset: InfosetId) -> usize {
        self.actions[infoset.0].len()
    }

    /// Returns whether `action` is active. Chance actions always are.
    #[inline]
    pub fn contains(&self, action: ActionId) -> bool {
        let iset = self.game.action_infoset(action);
        self.game.is_chance(iset) || self.slots[action.0].is_some()
    }

    /// Returns the flat profile index of a personal, active action.
    #[inline]
    pub fn index(&self, action: ActionId) -> Option<usize> {
        self.slots[action.0]
    }

    /// Returns the number of flat profile slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.layout.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.layout.is_empty()
    }

    /// Returns the action stored at each flat profile slot.
    #[inline]
    pub fn layout(&self) -> &[ActionId] {
        &self.layout
    }

    /// Returns the personal information sets in layout order.
    #[inline]
    pub fn infosets(&self) -> &[InfosetId] {
        &self.infosets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game_poker::myerson_poker;

    #[test]
    fn layout_is_ordered_by_player() {
        let game = myerson_poker().unwrap();
        let support = BehaviorSupport::new(&game);
        let labels = support
            .layout()
            .iter()
            .map(|&a| game.action_label(a))
            .collect::<Vec<_>>();
        assert_eq!(labels, ["Raise", "Fold", "Raise", "Fold", "Meet", "Pass"]);
        assert_eq!(support.len(), 6);
        assert_eq!(support.infosets().len(), 3);
    }

    #[test]
    fn removing_actions_reindexes() {
        let game = myerson_poker().unwrap();
        let mut support = BehaviorSupport::new(&game);
        let fold = support.layout()[1];
        let raise = support.layout()[0];
        assert!(support.remove_action(fold).unwrap());
        assert!(!support.contains(fold));
        assert_eq!(support.index(fold), None);
        assert_eq!(support.len(), 5);
        assert!(!support.remove_action(raise).unwrap());

        let deal = game.infoset_actions(InfosetId(0))[0];
        assert!(support.contains(deal));
        assert!(support.remove_action(deal).is_err());
    }

    #[test]
    fn mismatched_actions_are_rejected() {
        let game = myerson_poker().unwrap();
        let mut actions = (0..game.num_infosets())
            .map(|iset| game.infoset_actions(InfosetId(iset)).to_vec())
            .collect::<Vec<_>>();
        assert!(BehaviorSupport::from_actions(&game, actions.clone()).is_ok());

        actions.swap(1, 2);
        assert!(matches!(
            BehaviorSupport::from_actions(&game, actions),
            Err(Error::MismatchedSupport)
        ));
    }
}
