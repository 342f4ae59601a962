use crate::error::Result;
use crate::game_arena::ArenaGame;
use crate::game_tree::GameTree;

/// Myerson's one-card poker.
///
/// Chance deals Fred a red or black card with equal probability. Fred sees it
/// and raises or folds; Alice, who does not see the card, meets or passes a raise.
/// In the unique equilibrium Fred always raises red, raises black with
/// probability 1/3, and Alice meets with probability 2/3.
pub fn myerson_poker() -> Result<ArenaGame> {
    let mut game = ArenaGame::new("A simple Poker game", &["Fred", "Alice"]);

    let deal = game.add_chance_infoset("deal", &[("Red", 0.5), ("Black", 0.5)])?;
    let fred_red = game.add_infoset(0, "Fred red", &["Raise", "Fold"])?;
    let alice = game.add_infoset(1, "Alice", &["Meet", "Pass"])?;
    let fred_black = game.add_infoset(0, "Fred black", &["Raise", "Fold"])?;

    let win_big = game.add_outcome("Win Big", &[2.0, -2.0])?;
    let win = game.add_outcome("Win", &[1.0, -1.0])?;
    let lose_big = game.add_outcome("Lose Big", &[-2.0, 2.0])?;
    let lose = game.add_outcome("Lose", &[-1.0, 1.0])?;

    let cards = game.append_move(game.root(), deal)?;

    let red = game.append_move(cards[0], fred_red)?;
    let red_raise = game.append_move(red[0], alice)?;
    game.set_outcome(red_raise[0], win_big)?;
    game.set_outcome(red_raise[1], win)?;
    game.set_outcome(red[1], lose)?;

    let black = game.append_move(cards[1], fred_black)?;
    let black_raise = game.append_move(black[0], alice)?;
    game.set_outcome(black_raise[0], lose_big)?;
    game.set_outcome(black_raise[1], win)?;
    game.set_outcome(black[1], lose)?;

    Ok(game)
}
