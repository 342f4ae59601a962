use crate::error::{Error, Result};
use crate::game_tree::*;
use crate::support::BehaviorSupport;
use once_cell::unsync::OnceCell;

/// Quantities derived from a profile in one recompute.
#[derive(Clone, Debug, PartialEq)]
struct SolutionData {
    realiz_probs: Vec<f64>,
    log_realiz_probs: Vec<f64>,
    beliefs: Vec<f64>,
    /// Row-major, `num_players` entries per node.
    node_values: Vec<f64>,
    infoset_values: Vec<f64>,
    action_values: Vec<f64>,
}

/// Mixed behavior profile over a support, with lazily derived equilibrium quantities.
///
/// Probabilities and their logarithms are stored side by side, one slot per
/// active personal action, in the support's flat order. Chance probabilities are
/// always read from the game.
///
/// Profiles are expected to be interior. Sensitivity queries additionally assume
/// the game has perfect recall; callers check [`GameTree::is_perfect_recall`].
pub struct BehaviorProfile<'a, G: GameTree> {
    support: &'a BehaviorSupport<'a, G>,
    probs: Vec<f64>,
    log_probs: Vec<f64>,
    walk: Vec<NodeId>,
    /// The single validity flag: a filled cell is a valid cache. Every write clears
    /// it. A recompute builds `SolutionData` without going through any accessor
    /// and installs it only once all passes have finished, so it never re-enters.
    cache: OnceCell<SolutionData>,
}

/// Element-wise `lhs += scalar * rhs`.
#[inline]
fn add_scaled(lhs: &mut [f64], rhs: &[f64], scalar: f64) {
    for (l, r) in lhs.iter_mut().zip(rhs) {
        *l += scalar * r;
    }
}

/// Nodes of `game` in pre-order; every parent precedes its children.
fn pre_order<G: GameTree>(game: &G) -> Vec<NodeId> {
    let mut walk = Vec::with_capacity(game.num_nodes());
    let mut stack = vec![game.root()];
    while let Some(node) = stack.pop() {
        walk.push(node);
        stack.extend(game.children(node).iter().rev());
    }
    walk
}

impl<'a, G: GameTree> BehaviorProfile<'a, G> {
    /// Creates the centroid profile on `support`.
    pub fn new(support: &'a BehaviorSupport<'a, G>) -> Self {
        let mut ret = Self {
            support,
            probs: vec![0.0; support.len()],
            log_probs: vec![0.0; support.len()],
            walk: pre_order(support.game()),
            cache: OnceCell::new(),
        };
        ret.centroid();
        ret
    }

    #[inline]
    pub fn support(&self) -> &'a BehaviorSupport<'a, G> {
        self.support
    }

    #[inline]
    pub fn game(&self) -> &'a G {
        self.support.game()
    }

    /// Resets to the uniform distribution over active actions at every infoset.
    pub fn centroid(&mut self) {
        let support = self.support;
        for &iset in support.infosets() {
            let active = support.actions(iset);
            let prob = 1.0 / active.len() as f64;
            for &action in active {
                if let Some(index) = support.index(action) {
                    self.probs[index] = prob;
                    self.log_probs[index] = prob.ln();
                }
            }
        }
        self.invalidate();
    }

    #[inline]
    fn invalidate(&mut self) {
        self.cache.take();
    }

    /// Returns whether the derived cache is up to date.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.cache.get().is_some()
    }

    /// Returns the stored probabilities in support order.
    #[inline]
    pub fn probs(&self) -> &[f64] {
        &self.probs
    }

    /// Returns the stored log-probabilities in support order.
    #[inline]
    pub fn log_probs(&self) -> &[f64] {
        &self.log_probs
    }

    /// Probability of `action`: fixed for chance, zero outside the support.
    pub fn action_prob(&self, action: ActionId) -> f64 {
        let game = self.game();
        if game.is_chance(game.action_infoset(action)) {
            return game.chance_prob(action);
        }
        match self.support.index(action) {
            Some(index) => self.probs[index],
            None => 0.0,
        }
    }

    /// Natural log of the probability of `action`.
    ///
    /// Fails with [`Error::NonInterior`] for an active personal action whose stored
    /// probability is zero. Actions outside the support give negative infinity.
    pub fn log_action_prob(&self, action: ActionId) -> Result<f64> {
        match self.support.index(action) {
            Some(index) if self.probs[index] == 0.0 => Err(Error::NonInterior(action)),
            _ => Ok(self.log_prob(action)),
        }
    }

    #[inline]
    fn log_prob(&self, action: ActionId) -> f64 {
        let game = self.game();
        if game.is_chance(game.action_infoset(action)) {
            return game.chance_prob(action).ln();
        }
        match self.support.index(action) {
            Some(index) => self.log_probs[index],
            None => f64::NEG_INFINITY,
        }
    }

    fn slot(&self, action: ActionId) -> Result<usize> {
        let game = self.game();
        if game.is_chance(game.action_infoset(action)) {
            return Err(Error::ChanceAction(action));
        }
        self.support.index(action).ok_or(Error::NotInSupport(action))
    }

    /// Writes the probability of an active personal action.
    pub fn set_action_prob(&mut self, action: ActionId, prob: f64) -> Result<()> {
        if !(prob >= 0.0) || !prob.is_finite() {
            return Err(Error::InvalidProbability(prob));
        }
        let index = self.slot(action)?;
        self.probs[index] = prob;
        self.log_probs[index] = prob.ln();
        self.invalidate();
        Ok(())
    }

    /// Writes all probabilities at once, in support order.
    pub fn set_probs(&mut self, probs: &[f64]) -> Result<()> {
        self.check_len(probs.len())?;
        if let Some(&bad) = probs.iter().find(|&&p| !(p >= 0.0) || !p.is_finite()) {
            return Err(Error::InvalidProbability(bad));
        }
        for (index, &prob) in probs.iter().enumerate() {
            self.probs[index] = prob;
            self.log_probs[index] = prob.ln();
        }
        self.invalidate();
        Ok(())
    }

    /// Writes all log-probabilities at once, in support order. The logarithms are
    /// kept exactly as given; probabilities are their exponentials.
    pub fn set_log_probs(&mut self, log_probs: &[f64]) -> Result<()> {
        self.check_len(log_probs.len())?;
        if let Some(&bad) = log_probs.iter().find(|&&x| !x.exp().is_finite()) {
            return Err(Error::InvalidProbability(bad.exp()));
        }
        for (index, &log_prob) in log_probs.iter().enumerate() {
            self.log_probs[index] = log_prob;
            self.probs[index] = log_prob.exp();
        }
        self.invalidate();
        Ok(())
    }

    fn check_len(&self, found: usize) -> Result<()> {
        let expected = self.probs.len();
        if found != expected {
            return Err(Error::LengthMismatch { expected, found });
        }
        Ok(())
    }

    /// Brings the derived cache up to date. A no-op while the cache is valid.
    pub fn compute_solution_data(&self) {
        self.solution();
    }

    #[inline]
    fn solution(&self) -> &SolutionData {
        self.cache.get_or_init(|| self.recompute())
    }

    fn recompute(&self) -> SolutionData {
        let game = self.game();
        let num_nodes = game.num_nodes();
        let num_players = game.num_players();
        log::trace!("recomputing solution data over {} nodes", num_nodes);

        let mut data = SolutionData {
            realiz_probs: vec![0.0; num_nodes],
            log_realiz_probs: vec![f64::NEG_INFINITY; num_nodes],
            beliefs: vec![0.0; num_nodes],
            node_values: vec![0.0; num_nodes * num_players],
            infoset_values: vec![0.0; game.num_infosets()],
            action_values: vec![0.0; game.num_actions()],
        };

        self.realization_pass(&mut data);
        self.belief_pass(&mut data);
        self.payoff_pass(&mut data);

        for iset in (0..game.num_infosets()).map(InfosetId) {
            data.infoset_values[iset.0] = game
                .infoset_actions(iset)
                .iter()
                .map(|&action| self.action_prob(action) * data.action_values[action.0])
                .sum();
        }

        data
    }

    /// Pass 1: realization probabilities and their logarithms, root downwards.
    fn realization_pass(&self, data: &mut SolutionData) {
        let game = self.game();
        for &node in &self.walk {
            match (game.parent(node), game.prior_action(node)) {
                (Some(parent), Some(action)) => {
                    data.realiz_probs[node.0] = data.realiz_probs[parent.0] * self.action_prob(action);
                    data.log_realiz_probs[node.0] =
                        data.log_realiz_probs[parent.0] + self.log_prob(action);
                }
                _ => {
                    data.realiz_probs[node.0] = 1.0;
                    data.log_realiz_probs[node.0] = 0.0;
                }
            }
        }
    }

    /// Beliefs by log-sum-exp normalization; uniform over members when the
    /// infoset is reached with probability exactly zero.
    fn belief_pass(&self, data: &mut SolutionData) {
        let game = self.game();
        for iset in (0..game.num_infosets()).map(InfosetId) {
            let members = game.members(iset);
            if members.is_empty() {
                continue;
            }

            let total = members
                .iter()
                .map(|member| data.realiz_probs[member.0])
                .sum::<f64>();
            if total == 0.0 {
                let uniform = 1.0 / members.len() as f64;
                for member in members {
                    data.beliefs[member.0] = uniform;
                }
                continue;
            }

            let max = members
                .iter()
                .map(|member| data.log_realiz_probs[member.0])
                .fold(f64::NEG_INFINITY, f64::max);
            let denom = members
                .iter()
                .map(|member| (data.log_realiz_probs[member.0] - max).exp())
                .sum::<f64>();
            for member in members {
                data.beliefs[member.0] = (data.log_realiz_probs[member.0] - max).exp() / denom;
            }
        }
    }

    /// Pass 2: outcomes are carried down each path, then child values are folded
    /// back up, weighted by action probability. Personal moves also accumulate the
    /// belief-weighted value of each action to its owner.
    fn payoff_pass(&self, data: &mut SolutionData) {
        let game = self.game();
        let num_players = game.num_players();

        for &node in &self.walk {
            let base = node.0 * num_players;
            if let Some(parent) = game.parent(node) {
                let from = parent.0 * num_players;
                data.node_values
                    .copy_within(from..from + num_players, base);
            }
            if let Some(outcome) = game.outcome(node) {
                for player in 0..num_players {
                    data.node_values[base + player] += game.payoff(outcome, player);
                }
            }
        }

        let mut value = vec![0.0; num_players];
        for &node in self.walk.iter().rev() {
            let iset = match game.infoset(node) {
                Some(iset) => iset,
                None => continue,
            };
            let owner = game.infoset_player(iset).index();

            value.fill(0.0);
            for (&action, &child) in game.infoset_actions(iset).iter().zip(game.children(node)) {
                let child_value = &data.node_values[child.0 * num_players..][..num_players];
                add_scaled(&mut value, child_value, self.action_prob(action));
                if let Some(owner) = owner {
                    data.action_values[action.0] += data.beliefs[node.0] * child_value[owner];
                }
            }
            data.node_values[node.0 * num_players..][..num_players].copy_from_slice(&value);
        }
    }

    /// Probability that `node` is reached.
    #[inline]
    pub fn realiz_prob(&self, node: NodeId) -> f64 {
        self.solution().realiz_probs[node.0]
    }

    /// Log of the probability that `node` is reached, accumulated independently.
    #[inline]
    pub fn log_realiz_prob(&self, node: NodeId) -> f64 {
        self.solution().log_realiz_probs[node.0]
    }

    /// Probability of `node` given its infoset is reached. Zero for terminal nodes.
    #[inline]
    pub fn belief(&self, node: NodeId) -> f64 {
        self.solution().beliefs[node.0]
    }

    /// Expected payoff to every player from `node` onwards, including outcomes
    /// collected on the way to it.
    #[inline]
    pub fn node_values(&self, node: NodeId) -> &[f64] {
        let num_players = self.game().num_players();
        &self.solution().node_values[node.0 * num_players..][..num_players]
    }

    #[inline]
    pub fn node_value(&self, node: NodeId, player: usize) -> f64 {
        self.node_values(node)[player]
    }

    /// Expected payoff to the owner of `infoset`, conditional on reaching it.
    #[inline]
    pub fn infoset_value(&self, infoset: InfosetId) -> f64 {
        self.solution().infoset_values[infoset.0]
    }

    /// Expected payoff to the owner of `action`, conditional on taking it.
    #[inline]
    pub fn action_value(&self, action: ActionId) -> f64 {
        self.solution().action_values[action.0]
    }

    /// Probability that `infoset` is reached.
    pub fn infoset_prob(&self, infoset: InfosetId) -> f64 {
        let data = self.solution();
        self.game()
            .members(infoset)
            .iter()
            .map(|member| data.realiz_probs[member.0])
            .sum()
    }

    /// Gain from switching to `action`, weighted by the probability of reaching it.
    pub fn action_regret(&self, action: ActionId) -> f64 {
        let game = self.game();
        let iset = game.action_infoset(action);
        if game.is_chance(iset) {
            return 0.0;
        }
        let gain = self.action_value(action) - self.infoset_value(iset);
        self.infoset_prob(iset) * gain.max(0.0)
    }

    /// Largest regret over every personal action of the game.
    pub fn max_regret(&self) -> f64 {
        let game = self.game();
        (0..game.num_actions())
            .map(|action| self.action_regret(ActionId(action)))
            .fold(0.0, f64::max)
    }

    /// Expected payoff to `player` from the root, by a weighted walk over the
    /// current action probabilities. Does not touch the cache.
    pub fn payoff(&self, player: usize) -> f64 {
        self.payoff_rec(self.game().root(), 1.0, player)
    }

    fn payoff_rec(&self, node: NodeId, prob: f64, player: usize) -> f64 {
        let game = self.game();
        let mut value = match game.outcome(node) {
            Some(outcome) => prob * game.payoff(outcome, player),
            None => 0.0,
        };
        if let Some(iset) = game.infoset(node) {
            for (&action, &child) in game.infoset_actions(iset).iter().zip(game.children(node)) {
                value += self.payoff_rec(child, prob * self.action_prob(action), player);
            }
        }
        value
    }

    /// Derivative of [`action_value`](Self::action_value) of `action` with respect
    /// to the log-probability of `opp_action`, an action at a different infoset.
    ///
    /// Per member of the infoset, a path through `opp_action` moves the belief,
    /// contributing `belief * (child value - action value)`. Separately, the value
    /// below the member reacts through [`diff_node_value`](Self::diff_node_value),
    /// scaled by the probability of `opp_action`. Requires perfect recall.
    pub fn diff_action_value(&self, action: ActionId, opp_action: ActionId) -> f64 {
        let game = self.game();
        let data = self.solution();
        let iset = game.action_infoset(action);
        let owner = match game.infoset_player(iset).index() {
            Some(owner) => owner,
            None => return 0.0,
        };
        let num_players = game.num_players();
        let opp_iset = game.action_infoset(opp_action);
        let opp_prob = self.action_prob(opp_action);

        let mut deriv = 0.0;
        for &member in game.members(iset) {
            let child = game.child(member, action);
            let belief = data.beliefs[member.0];
            if game.preceding_action(member, opp_iset) == Some(opp_action) {
                deriv += belief
                    * (data.node_values[child.0 * num_players + owner]
                        - data.action_values[action.0]);
            }
            deriv += belief * opp_prob * self.diff_node_value(child, owner, opp_action);
        }
        deriv
    }

    /// Derivative of [`action_value`](Self::action_value) of `action` with respect
    /// to the probability of `opp_action` itself. Zero when that probability is zero.
    pub fn diff_action_value_prob(&self, action: ActionId, opp_action: ActionId) -> f64 {
        let opp_prob = self.action_prob(opp_action);
        if opp_prob == 0.0 {
            return 0.0;
        }
        self.diff_action_value(action, opp_action) / opp_prob
    }

    /// Derivative of the value to `player` at `node` with respect to the
    /// probability of `opp_action`.
    pub fn diff_node_value(&self, node: NodeId, player: usize, opp_action: ActionId) -> f64 {
        let game = self.game();
        let iset = match game.infoset(node) {
            Some(iset) => iset,
            None => return 0.0,
        };
        if iset == game.action_infoset(opp_action) {
            // with perfect recall the infoset is not met again below this point
            return self.node_value(game.child(node, opp_action), player);
        }
        game.infoset_actions(iset)
            .iter()
            .zip(game.children(node))
            .map(|(&action, &child)| {
                self.action_prob(action) * self.diff_node_value(child, player, opp_action)
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game_arena::ArenaGame;
    use crate::game_poker::myerson_poker;

    const EPS: f64 = 1e-12;

    /// Two moves for the first player around a hidden coin flip and a second
    /// player who sees neither. An outcome sits on the internal chance node.
    fn nested_game() -> ArenaGame {
        let mut game = ArenaGame::new("nested", &["P1", "P2"]);
        let a = game.add_infoset(0, "A", &["L", "R"]).unwrap();
        let coin = game.add_chance_infoset("coin", &[("H", 0.3), ("T", 0.7)]).unwrap();
        let b = game.add_infoset(1, "B", &["l", "r"]).unwrap();
        let c = game.add_infoset(0, "C", &["x", "y"]).unwrap();

        let top = game.append_move(game.root(), a).unwrap();
        let toll = game.add_outcome("toll", &[1.0, -1.0]).unwrap();
        game.set_outcome(top[0], toll).unwrap();
        let right = game.add_outcome("right", &[0.5, 0.5]).unwrap();
        game.set_outcome(top[1], right).unwrap();

        let flips = game.append_move(top[0], coin).unwrap();
        let payoffs = [
            ([3.0, 0.0], [0.0, 2.0], [-1.0, 1.0]),
            ([-2.0, 1.0], [4.0, -3.0], [2.0, 2.0]),
        ];
        for (&flip, (x, y, r)) in flips.iter().zip(payoffs.iter()) {
            let moves = game.append_move(flip, b).unwrap();
            let last = game.append_move(moves[0], c).unwrap();
            let outcomes = [
                game.add_outcome("x", x).unwrap(),
                game.add_outcome("y", y).unwrap(),
                game.add_outcome("r", r).unwrap(),
            ];
            game.set_outcome(last[0], outcomes[0]).unwrap();
            game.set_outcome(last[1], outcomes[1]).unwrap();
            game.set_outcome(moves[1], outcomes[2]).unwrap();
        }
        game
    }

    fn interior(profile: &mut BehaviorProfile<ArenaGame>) {
        profile.set_probs(&[0.6, 0.4, 0.2, 0.8, 0.7, 0.3]).unwrap();
    }

    #[test]
    fn centroid_is_uniform() {
        let game = myerson_poker().unwrap();
        let support = BehaviorSupport::new(&game);
        let profile = BehaviorProfile::new(&support);
        assert!(!profile.is_valid());
        for &action in support.layout() {
            assert_eq!(profile.action_prob(action), 0.5);
            assert_eq!(profile.log_action_prob(action).unwrap(), (0.5f64).ln());
        }

        let mut restricted = BehaviorSupport::new(&game);
        let fold = restricted.layout()[1];
        restricted.remove_action(fold).unwrap();
        let profile = BehaviorProfile::new(&restricted);
        assert_eq!(profile.action_prob(restricted.layout()[0]), 1.0);
        assert_eq!(profile.action_prob(fold), 0.0);
        assert_eq!(profile.log_action_prob(fold).unwrap(), f64::NEG_INFINITY);
    }

    #[test]
    fn chance_probabilities_come_from_the_game() {
        let game = nested_game();
        let support = BehaviorSupport::new(&game);
        let mut profile = BehaviorProfile::new(&support);
        let heads = game.infoset_actions(InfosetId(1))[0];
        assert_eq!(profile.action_prob(heads), 0.3);
        assert_eq!(profile.log_action_prob(heads).unwrap(), (0.3f64).ln());
        assert!(matches!(
            profile.set_action_prob(heads, 0.5),
            Err(Error::ChanceAction(_))
        ));
    }

    #[test]
    fn log_writes_reject_overflowing_probabilities() {
        let game = nested_game();
        let support = BehaviorSupport::new(&game);
        let mut profile = BehaviorProfile::new(&support);
        let before = profile.log_probs().to_vec();
        let mut log_probs = before.clone();
        log_probs[0] = 800.0;
        assert!(matches!(
            profile.set_log_probs(&log_probs),
            Err(Error::InvalidProbability(p)) if p.is_infinite()
        ));
        log_probs[0] = f64::NAN;
        assert!(profile.set_log_probs(&log_probs).is_err());
        assert_eq!(profile.log_probs(), &before[..]);
        assert!(profile.payoff(0).is_finite());

        log_probs[0] = f64::NEG_INFINITY;
        profile.set_log_probs(&log_probs).unwrap();
        assert_eq!(profile.probs()[0], 0.0);
    }

    #[test]
    fn writes_invalidate_the_cache() {
        let game = nested_game();
        let support = BehaviorSupport::new(&game);
        let mut profile = BehaviorProfile::new(&support);
        profile.compute_solution_data();
        assert!(profile.is_valid());
        profile.set_action_prob(support.layout()[0], 0.9).unwrap();
        assert!(!profile.is_valid());
        assert!(profile.set_action_prob(support.layout()[0], -0.1).is_err());
        assert!(matches!(
            profile.set_probs(&[0.5]),
            Err(Error::LengthMismatch { expected: 6, found: 1 })
        ));
    }

    #[test]
    fn recompute_is_idempotent() {
        let game = nested_game();
        let support = BehaviorSupport::new(&game);
        let mut profile = BehaviorProfile::new(&support);
        interior(&mut profile);

        profile.compute_solution_data();
        let first = profile.solution() as *const SolutionData;
        profile.compute_solution_data();
        let second = profile.solution();
        assert!(std::ptr::eq(first, second));
        assert_eq!(*second, profile.recompute());
    }

    #[test]
    fn beliefs_sum_to_one() {
        let game = nested_game();
        let support = BehaviorSupport::new(&game);
        let mut profile = BehaviorProfile::new(&support);
        interior(&mut profile);
        for iset in (0..game.num_infosets()).map(InfosetId) {
            let total = game
                .members(iset)
                .iter()
                .map(|&m| profile.belief(m))
                .sum::<f64>();
            assert!((total - 1.0).abs() < EPS);
        }
        // the second player cannot see the coin
        let b = game.members(InfosetId(2));
        assert!((profile.belief(b[0]) - 0.3).abs() < EPS);
        assert!((profile.belief(b[1]) - 0.7).abs() < EPS);
    }

    #[test]
    fn unreachable_infoset_gets_uniform_beliefs() {
        let game = nested_game();
        let support = BehaviorSupport::new(&game);
        let mut profile = BehaviorProfile::new(&support);
        profile.set_action_prob(support.layout()[0], 0.0).unwrap();
        for iset in [InfosetId(2), InfosetId(3)] {
            assert_eq!(profile.infoset_prob(iset), 0.0);
            for &member in game.members(iset) {
                assert_eq!(profile.belief(member), 0.5);
            }
        }
        assert!(matches!(
            profile.log_action_prob(support.layout()[0]),
            Err(Error::NonInterior(_))
        ));
    }

    #[test]
    fn realization_matches_log_realization() {
        let game = nested_game();
        let support = BehaviorSupport::new(&game);
        let mut profile = BehaviorProfile::new(&support);
        interior(&mut profile);
        for node in (0..game.num_nodes()).map(NodeId) {
            let realiz = profile.realiz_prob(node);
            assert!((realiz - profile.log_realiz_prob(node).exp()).abs() < EPS);
        }
        let leaf = game.children(game.members(InfosetId(3))[1])[1];
        assert!((profile.realiz_prob(leaf) - 0.6 * 0.7 * 0.7 * 0.8).abs() < EPS);
    }

    #[test]
    fn log_domain_beliefs_survive_underflow() {
        // 31 moves at probability 1e-10 leave the plain product subnormal
        let mut game = ArenaGame::new("deep", &["P1", "P2"]);
        let coin = game.add_chance_infoset("coin", &[("H", 0.5), ("T", 0.5)]).unwrap();
        let end = game.add_infoset(1, "end", &["a", "b"]).unwrap();
        let flips = game.append_move(game.root(), coin).unwrap();
        let mut leaves = Vec::new();
        for (side, &flip) in flips.iter().enumerate() {
            let mut node = flip;
            for depth in 0..31 {
                let label = format!("step {} {}", side, depth);
                let iset = game.add_infoset(0, &label, &["go", "stop"]).unwrap();
                node = game.append_move(node, iset).unwrap()[0];
            }
            leaves.push(node);
        }
        for &leaf in &leaves {
            game.append_move(leaf, end).unwrap();
        }

        let support = BehaviorSupport::new(&game);
        let mut profile = BehaviorProfile::new(&support);
        let mut log_probs = vec![0.0; support.len()];
        for (index, &action) in support.layout().iter().enumerate() {
            let label = game.infoset_label(game.action_infoset(action));
            log_probs[index] = match (label.starts_with("step 0"), game.action_label(action)) {
                (true, "go") => (1e-10f64).ln(),
                (false, "go") => (2e-10f64).ln(),
                _ => 0.0,
            };
        }
        profile.set_log_probs(&log_probs).unwrap();

        let tiny = profile.realiz_prob(leaves[0]);
        assert!(tiny > 0.0 && tiny < f64::MIN_POSITIVE);
        let total = profile.belief(leaves[0]) + profile.belief(leaves[1]);
        assert!((total - 1.0).abs() < EPS);
        let ratio = profile.belief(leaves[1]) / profile.belief(leaves[0]);
        assert!((ratio / 2f64.powi(31) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn payoff_matches_brute_force() {
        let mut game = ArenaGame::new("binary", &["P1", "P2"]);
        let top = game.add_infoset(0, "top", &["L", "R"]).unwrap();
        let left = game.add_infoset(1, "left", &["a", "b"]).unwrap();
        let right = game.add_infoset(1, "right", &["c", "d"]).unwrap();
        let children = game.append_move(game.root(), top).unwrap();
        let payoffs = [[4.0, -1.0], [0.0, 3.0], [-2.0, 5.0], [1.0, 1.0]];
        let mut leaves = game.append_move(children[0], left).unwrap();
        leaves.extend(game.append_move(children[1], right).unwrap());
        for (&leaf, payoff) in leaves.iter().zip(payoffs.iter()) {
            let outcome = game.add_outcome("", payoff).unwrap();
            game.set_outcome(leaf, outcome).unwrap();
        }

        let support = BehaviorSupport::new(&game);
        let mut profile = BehaviorProfile::new(&support);
        let (p, q, s) = (0.35, 0.8, 0.1);
        profile.set_probs(&[p, 1.0 - p, q, 1.0 - q, s, 1.0 - s]).unwrap();

        let paths = [p * q, p * (1.0 - q), (1.0 - p) * s, (1.0 - p) * (1.0 - s)];
        for player in 0..2 {
            let expected = paths
                .iter()
                .zip(payoffs.iter())
                .map(|(prob, payoff)| prob * payoff[player])
                .sum::<f64>();
            assert!((profile.payoff(player) - expected).abs() < EPS);
            assert!((profile.node_value(game.root(), player) - expected).abs() < EPS);
        }
    }

    #[test]
    fn internal_outcomes_reach_the_root() {
        let game = nested_game();
        let support = BehaviorSupport::new(&game);
        let mut profile = BehaviorProfile::new(&support);
        interior(&mut profile);
        for player in 0..2 {
            let walked = profile.payoff(player);
            assert!((profile.node_value(game.root(), player) - walked).abs() < EPS);
        }
        // the toll on the chance node is part of every value below it
        let toll_node = game.children(game.root())[0];
        let below = profile.node_value(toll_node, 0);
        let coin_values = game
            .children(toll_node)
            .iter()
            .map(|&c| profile.node_value(c, 0))
            .collect::<Vec<_>>();
        assert!((below - (0.3 * coin_values[0] + 0.7 * coin_values[1])).abs() < EPS);
    }

    #[test]
    fn infoset_value_averages_action_values() {
        let game = nested_game();
        let support = BehaviorSupport::new(&game);
        let mut profile = BehaviorProfile::new(&support);
        interior(&mut profile);
        for &iset in support.infosets() {
            let expected = game
                .infoset_actions(iset)
                .iter()
                .map(|&a| profile.action_prob(a) * profile.action_value(a))
                .sum::<f64>();
            assert!((profile.infoset_value(iset) - expected).abs() < EPS);
        }
        // value of x at C: beliefs .3/.7 over the coin
        let x = game.infoset_actions(InfosetId(3))[0];
        assert!((profile.action_value(x) - (0.3 * 4.0 + 0.7 * -1.0)).abs() < EPS);
    }

    #[test]
    fn sensitivity_matches_finite_differences() {
        let eps = 1e-6;
        for game in [nested_game(), myerson_poker().unwrap()] {
            let support = BehaviorSupport::new(&game);
            let mut profile = BehaviorProfile::new(&support);
            let base = (0..support.len())
                .map(|i| 0.15 + 0.1 * i as f64)
                .collect::<Vec<_>>();
            profile.set_probs(&base).unwrap();

            for &action in support.layout() {
                for (index, &opp) in support.layout().iter().enumerate() {
                    if game.action_infoset(opp) == game.action_infoset(action) {
                        continue;
                    }
                    let mut up = BehaviorProfile::new(&support);
                    let mut down = BehaviorProfile::new(&support);
                    let mut probs = base.clone();
                    probs[index] = base[index] + eps;
                    up.set_probs(&probs).unwrap();
                    probs[index] = base[index] - eps;
                    down.set_probs(&probs).unwrap();

                    let numeric = (up.action_value(action) - down.action_value(action)) / (2.0 * eps);
                    let analytic = profile.diff_action_value_prob(action, opp);
                    assert!(
                        (numeric - analytic).abs() < 1e-6,
                        "{:?} wrt {:?}: {} vs {}",
                        action,
                        opp,
                        numeric,
                        analytic
                    );
                    let log_deriv = profile.diff_action_value(action, opp);
                    assert!((log_deriv - base[index] * analytic).abs() < 1e-12);
                }
            }
        }
    }

    #[test]
    fn same_infoset_sensitivity_vanishes() {
        let game = nested_game();
        let support = BehaviorSupport::new(&game);
        let mut profile = BehaviorProfile::new(&support);
        interior(&mut profile);
        let c = game.infoset_actions(InfosetId(3));
        assert_eq!(profile.diff_action_value(c[0], c[1]), 0.0);
    }

    #[test]
    fn poker_equilibrium_has_no_regret() {
        let game = myerson_poker().unwrap();
        let support = BehaviorSupport::new(&game);
        let mut profile = BehaviorProfile::new(&support);
        assert!(profile.max_regret() > 0.1);

        profile
            .set_probs(&[1.0, 0.0, 1.0 / 3.0, 2.0 / 3.0, 2.0 / 3.0, 1.0 / 3.0])
            .unwrap();
        assert!(profile.max_regret() < EPS);

        let alice = game.members(InfosetId(2));
        assert!((profile.belief(alice[0]) - 0.75).abs() < EPS);
        assert!((profile.infoset_value(InfosetId(2)) + 1.0).abs() < EPS);
        assert!((profile.payoff(0) - 1.0 / 3.0).abs() < EPS);
    }
}
