use qre_behav::game_arena::ArenaGame;
use qre_behav::game_poker::myerson_poker;
use qre_behav::game_tree::*;
use qre_behav::{BehaviorProfile, BehaviorSupport, Result};

fn main() -> Result<()> {
    env_logger::init();
    let game = myerson_poker()?;
    let support = BehaviorSupport::new(&game);
    let profile = BehaviorProfile::new(&support);
    report(&game, &support, &profile);
    Ok(())
}

fn report(game: &ArenaGame, support: &BehaviorSupport<ArenaGame>, profile: &BehaviorProfile<ArenaGame>) {
    println!();
    println!("[{}] (centroid)", game.title());
    println!("- Payoff of {}: {:+.4}", game.player_name(0), profile.payoff(0));
    println!("- Payoff of {}: {:+.4}", game.player_name(1), profile.payoff(1));
    println!("- Max regret: {:.3e}", profile.max_regret());

    println!();
    println!("(node: realization, belief, values)");
    for node in (0..game.num_nodes()).map(NodeId) {
        let values = profile
            .node_values(node)
            .iter()
            .map(|v| format!("{:+.4}", v))
            .collect::<Vec<_>>();
        let label = match (game.infoset(node), game.outcome(node)) {
            (Some(iset), _) => game.infoset_label(iset).to_string(),
            (None, Some(outcome)) => game.outcome_label(outcome).to_string(),
            (None, None) => "terminal".to_string(),
        };
        println!(
            "- #{:<2} {:<10} {:.4}, {:.4}, [{}]",
            node.0,
            label,
            profile.realiz_prob(node),
            profile.belief(node),
            values.join(", "),
        );
    }

    println!();
    println!("(infoset: value; action: value, regret)");
    for &iset in support.infosets() {
        println!(
            "- {} ({}): {:+.4}",
            game.infoset_label(iset),
            game.player_name(game.infoset_player(iset).index().unwrap_or(0)),
            profile.infoset_value(iset),
        );
        for &action in support.actions(iset) {
            println!(
                "    {}: {:+.4}, {:.4}",
                game.action_label(action),
                profile.action_value(action),
                profile.action_regret(action),
            );
        }
    }

    println!();
    println!("(sensitivity: d value(row) / d log prob(column))");
    let layout = support.layout();
    let header = layout
        .iter()
        .map(|&a| format!("{:>8}", game.action_label(a)))
        .collect::<String>();
    println!("{:>8}{}", "", header);
    for &action in layout {
        let row = layout
            .iter()
            .map(|&opp| format!("{:>+8.4}", profile.diff_action_value(action, opp)))
            .collect::<String>();
        println!("{:>8}{}", game.action_label(action), row);
    }
}
