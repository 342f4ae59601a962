use crate::error::{Error, Result};
use crate::game_tree::*;

#[derive(Clone, Debug)]
struct Node {
    parent: Option<NodeId>,
    prior_action: Option<ActionId>,
    children: Vec<NodeId>,
    infoset: Option<InfosetId>,
    outcome: Option<OutcomeId>,
}

#[derive(Clone, Debug)]
struct Infoset {
    player: Player,
    label: String,
    actions: Vec<ActionId>,
    members: Vec<NodeId>,
}

#[derive(Clone, Debug)]
struct Action {
    infoset: InfosetId,
    number: usize,
    label: String,
    prob: f64,
}

#[derive(Clone, Debug)]
struct Outcome {
    label: String,
    payoffs: Vec<f64>,
}

/// Game tree stored in dense arenas. Every entity is indexed by creation order,
/// and indices never change once assigned.
#[derive(Clone, Debug)]
pub struct ArenaGame {
    title: String,
    players: Vec<String>,
    nodes: Vec<Node>,
    infosets: Vec<Infoset>,
    actions: Vec<Action>,
    outcomes: Vec<Outcome>,
}

impl ArenaGame {
    /// Creates a game consisting of a single root node.
    pub fn new(title: &str, players: &[&str]) -> Self {
        Self {
            title: title.into(),
            players: players.iter().map(|&name| name.into()).collect(),
            nodes: vec![Node {
                parent: None,
                prior_action: None,
                children: Vec::new(),
                infoset: None,
                outcome: None,
            }],
            infosets: Vec::new(),
            actions: Vec::new(),
            outcomes: Vec::new(),
        }
    }

    #[inline]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[inline]
    pub fn player_name(&self, player: usize) -> &str {
        &self.players[player]
    }

    #[inline]
    pub fn infoset_label(&self, infoset: InfosetId) -> &str {
        &self.infosets[infoset.0].label
    }

    #[inline]
    pub fn action_label(&self, action: ActionId) -> &str {
        &self.actions[action.0].label
    }

    #[inline]
    pub fn outcome_label(&self, outcome: OutcomeId) -> &str {
        &self.outcomes[outcome.0].label
    }

    /// Adds an information set for personal player `player` with the given action labels.
    pub fn add_infoset(
        &mut self,
        player: usize,
        label: &str,
        actions: &[&str],
    ) -> Result<InfosetId> {
        if player >= self.players.len() {
            return Err(Error::InvalidGame(format!("no player with index {}", player)));
        }
        let actions = actions.iter().map(|&label| (label, 0.0)).collect::<Vec<_>>();
        self.push_infoset(Player::Personal(player), label, &actions)
    }

    /// Adds a chance information set. Probabilities must be non-negative and sum to one.
    pub fn add_chance_infoset(&mut self, label: &str, actions: &[(&str, f64)]) -> Result<InfosetId> {
        if actions.iter().any(|&(_, prob)| !(prob >= 0.0) || !prob.is_finite()) {
            return Err(Error::InvalidGame(format!(
                "chance infoset '{}' has an invalid probability",
                label
            )));
        }
        let total = actions.iter().map(|&(_, prob)| prob).sum::<f64>();
        if (total - 1.0).abs() > 1e-9 {
            return Err(Error::InvalidGame(format!(
                "chance probabilities at '{}' sum to {}",
                label, total
            )));
        }
        self.push_infoset(Player::Chance, label, actions)
    }

    fn push_infoset(
        &mut self,
        player: Player,
        label: &str,
        actions: &[(&str, f64)],
    ) -> Result<InfosetId> {
        if actions.is_empty() {
            return Err(Error::InvalidGame(format!("infoset '{}' has no actions", label)));
        }
        let id = InfosetId(self.infosets.len());
        let mut ids = Vec::with_capacity(actions.len());
        for (number, &(action_label, prob)) in actions.iter().enumerate() {
            ids.push(ActionId(self.actions.len()));
            self.actions.push(Action {
                infoset: id,
                number,
                label: action_label.into(),
                prob,
            });
        }
        self.infosets.push(Infoset {
            player,
            label: label.into(),
            actions: ids,
            members: Vec::new(),
        });
        Ok(id)
    }

    /// Turns the terminal node `node` into a member of `infoset`, creating one child per action.
    pub fn append_move(&mut self, node: NodeId, infoset: InfosetId) -> Result<Vec<NodeId>> {
        if node.0 >= self.nodes.len() || infoset.0 >= self.infosets.len() {
            return Err(Error::InvalidGame("node or infoset out of range".into()));
        }
        if self.nodes[node.0].infoset.is_some() {
            return Err(Error::InvalidGame(format!("node {} already has a move", node.0)));
        }

        let actions = self.infosets[infoset.0].actions.clone();
        let mut children = Vec::with_capacity(actions.len());
        for action in actions {
            children.push(NodeId(self.nodes.len()));
            self.nodes.push(Node {
                parent: Some(node),
                prior_action: Some(action),
                children: Vec::new(),
                infoset: None,
                outcome: None,
            });
        }

        self.nodes[node.0].children = children.clone();
        self.nodes[node.0].infoset = Some(infoset);
        self.infosets[infoset.0].members.push(node);
        Ok(children)
    }

    /// Adds an outcome with one payoff per personal player.
    pub fn add_outcome(&mut self, label: &str, payoffs: &[f64]) -> Result<OutcomeId> {
        if payoffs.len() != self.players.len() {
            return Err(Error::InvalidGame(format!(
                "outcome '{}' has {} payoffs for {} players",
                label,
                payoffs.len(),
                self.players.len()
            )));
        }
        self.outcomes.push(Outcome {
            label: label.into(),
            payoffs: payoffs.to_vec(),
        });
        Ok(OutcomeId(self.outcomes.len() - 1))
    }

    /// Attaches `outcome` to `node`. Outcomes may sit on internal nodes as well.
    pub fn set_outcome(&mut self, node: NodeId, outcome: OutcomeId) -> Result<()> {
        if node.0 >= self.nodes.len() || outcome.0 >= self.outcomes.len() {
            return Err(Error::InvalidGame("node or outcome out of range".into()));
        }
        self.nodes[node.0].outcome = Some(outcome);
        Ok(())
    }

    /// The (infoset, action) pairs `player` has chosen on the path to `node`, root first.
    fn own_history(&self, node: NodeId, player: Player) -> Vec<(InfosetId, ActionId)> {
        let mut history = Vec::new();
        let mut node = node;
        while let Some(parent) = self.nodes[node.0].parent {
            if let (Some(infoset), Some(action)) =
                (self.nodes[parent.0].infoset, self.nodes[node.0].prior_action)
            {
                if self.infosets[infoset.0].player == player {
                    history.push((infoset, action));
                }
            }
            node = parent;
        }
        history.reverse();
        history
    }
}

impl GameTree for ArenaGame {
    #[inline]
    fn root(&self) -> NodeId {
        NodeId(0)
    }

    #[inline]
    fn num_players(&self) -> usize {
        self.players.len()
    }

    #[inline]
    fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    fn num_infosets(&self) -> usize {
        self.infosets.len()
    }

    #[inline]
    fn num_actions(&self) -> usize {
        self.actions.len()
    }

    #[inline]
    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    #[inline]
    fn prior_action(&self, node: NodeId) -> Option<ActionId> {
        self.nodes[node.0].prior_action
    }

    #[inline]
    fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    #[inline]
    fn infoset(&self, node: NodeId) -> Option<InfosetId> {
        self.nodes[node.0].infoset
    }

    #[inline]
    fn outcome(&self, node: NodeId) -> Option<OutcomeId> {
        self.nodes[node.0].outcome
    }

    #[inline]
    fn payoff(&self, outcome: OutcomeId, player: usize) -> f64 {
        self.outcomes[outcome.0].payoffs[player]
    }

    #[inline]
    fn infoset_player(&self, infoset: InfosetId) -> Player {
        self.infosets[infoset.0].player
    }

    #[inline]
    fn members(&self, infoset: InfosetId) -> &[NodeId] {
        &self.infosets[infoset.0].members
    }

    #[inline]
    fn infoset_actions(&self, infoset: InfosetId) -> &[ActionId] {
        &self.infosets[infoset.0].actions
    }

    #[inline]
    fn action_infoset(&self, action: ActionId) -> InfosetId {
        self.actions[action.0].infoset
    }

    #[inline]
    fn action_number(&self, action: ActionId) -> usize {
        self.actions[action.0].number
    }

    #[inline]
    fn chance_prob(&self, action: ActionId) -> f64 {
        self.actions[action.0].prob
    }

    fn is_perfect_recall(&self) -> bool {
        for (index, infoset) in self.infosets.iter().enumerate() {
            if infoset.player.is_chance() {
                continue;
            }
            let id = InfosetId(index);
            let mut histories = infoset
                .members
                .iter()
                .map(|&member| self.own_history(member, infoset.player));
            let first = match histories.next() {
                Some(history) => history,
                None => continue,
            };
            // a path that revisits the infoset shows up in its own history
            if first.iter().any(|&(seen, _)| seen == id) {
                return false;
            }
            if histories.any(|history| history != first) {
                return false;
            }
        }
        true
    }
}
