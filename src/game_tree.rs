/// Index of a node in the game tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// Index of an information set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InfosetId(pub usize);

/// Index of an action. Actions are numbered globally, not per information set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionId(pub usize);

/// Index of an outcome (a payoff vector attached to a node).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutcomeId(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Player {
    Chance,
    Personal(usize),
}

impl Player {
    #[inline]
    pub fn is_chance(&self) -> bool {
        matches!(self, Player::Chance)
    }

    /// Returns the personal player's index, or `None` for chance.
    #[inline]
    pub fn index(&self) -> Option<usize> {
        match self {
            Player::Chance => None,
            Player::Personal(pl) => Some(*pl),
        }
    }
}

/// Read-only query surface of an extensive-form game tree.
pub trait GameTree {
    /// Returns the root node.
    fn root(&self) -> NodeId;

    /// Returns the number of personal players.
    fn num_players(&self) -> usize;

    /// Returns the total number of nodes.
    fn num_nodes(&self) -> usize;

    /// Returns the total number of information sets, chance included.
    fn num_infosets(&self) -> usize;

    /// Returns the total number of actions, chance included.
    fn num_actions(&self) -> usize;

    /// Returns the parent of `node`, or `None` at the root.
    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Returns the action that leads from the parent into `node`.
    fn prior_action(&self, node: NodeId) -> Option<ActionId>;

    /// Returns the children of `node`, ordered like the actions of its infoset.
    fn children(&self, node: NodeId) -> &[NodeId];

    /// Returns the information set owning `node`; terminal nodes have none.
    fn infoset(&self, node: NodeId) -> Option<InfosetId>;

    /// Returns the outcome attached to `node`, if any.
    fn outcome(&self, node: NodeId) -> Option<OutcomeId>;

    /// Returns the payoff of `outcome` to personal player `player`.
    fn payoff(&self, outcome: OutcomeId, player: usize) -> f64;

    /// Returns the player moving at `infoset`.
    fn infoset_player(&self, infoset: InfosetId) -> Player;

    /// Returns the member nodes of `infoset`.
    fn members(&self, infoset: InfosetId) -> &[NodeId];

    /// Returns the actions available at `infoset`.
    fn infoset_actions(&self, infoset: InfosetId) -> &[ActionId];

    /// Returns the information set `action` belongs to.
    fn action_infoset(&self, action: ActionId) -> InfosetId;

    /// Returns the position of `action` within its information set.
    fn action_number(&self, action: ActionId) -> usize;

    /// Returns the fixed probability of a chance action.
    fn chance_prob(&self, action: ActionId) -> f64;

    /// Returns whether every node's history crosses each information set at most once
    /// and members of one information set share the owner's own history.
    fn is_perfect_recall(&self) -> bool;

    /// Returns whether `infoset` belongs to the chance player.
    #[inline]
    fn is_chance(&self, infoset: InfosetId) -> bool {
        self.infoset_player(infoset).is_chance()
    }

    /// Returns the child of `node` reached by playing `action`.
    #[inline]
    fn child(&self, node: NodeId, action: ActionId) -> NodeId {
        self.children(node)[self.action_number(action)]
    }

    /// Walks ancestors of `node` upwards and returns the action taken at `infoset`,
    /// or `None` when the path from the root never passes through it.
    fn preceding_action(&self, node: NodeId, infoset: InfosetId) -> Option<ActionId> {
        let mut node = node;
        while let Some(parent) = self.parent(node) {
            if self.infoset(parent) == Some(infoset) {
                return self.prior_action(node);
            }
            node = parent;
        }
        None
    }
}
