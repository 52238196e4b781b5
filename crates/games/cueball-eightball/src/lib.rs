pub mod collision;
pub mod physics;
pub mod rules;
pub mod table;

use serde::{Deserialize, Serialize};

use cueball_core::player::Player;

use physics::Ball;
use table::{BallColor, RACK, TableConfig};

/// Full observable state of a match, broadcast to observers after every tick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    pub balls: Vec<Ball>,
    pub current_turn: Player,
    pub scores: [u32; 2],
    /// Every pot the rules have processed, in rack order.
    pub potted_balls: Vec<Ball>,
    pub can_shoot: bool,
    pub game_over: bool,
    #[serde(with = "cueball_core::player::optional")]
    pub winning_player: Option<Player>,
    pub tick: u64,
}

/// Something that happened during a single [`EightBall::tick`].
#[derive(Debug, Clone, PartialEq)]
pub enum TableEvent {
    /// A ball dropped and was credited to `player` (the shooter).
    /// `pocket` is `None` when the ball was marked potted outside the
    /// physics step.
    BallPotted {
        ball: usize,
        color: BallColor,
        player: Player,
        pocket: Option<usize>,
    },
    CueBallRespotted { x: f64, y: f64 },
    BlackPotted {
        player: Player,
        winner: Player,
        legal: bool,
    },
    /// Every ball stopped after a shot.
    TableAtRest,
    TurnChanged { to: Player },
}

/// Two-player eight-ball on a single table.
///
/// Not reentrant: the owner serializes `tick`, `shoot` and `restart`.
pub struct EightBall {
    table: TableConfig,
    balls: Vec<Ball>,
    current_turn: Player,
    scores: [u32; 2],
    can_shoot: bool,
    game_over: bool,
    winning_player: Option<Player>,
    tick: u64,
}

impl EightBall {
    pub fn new() -> Self {
        Self::with_table(TableConfig::default())
    }

    /// Fresh rack on the given table; the cue ball is the last ball.
    pub fn with_table(table: TableConfig) -> Self {
        let mut balls: Vec<Ball> = RACK
            .iter()
            .map(|&(color, at)| Ball::new(color, at))
            .collect();
        balls.push(Ball::new(BallColor::White, table.cue_spot));

        Self {
            table,
            balls,
            current_turn: Player::One,
            scores: [0, 0],
            can_shoot: true,
            game_over: false,
            winning_player: None,
            tick: 0,
        }
    }

    pub fn table(&self) -> &TableConfig {
        &self.table
    }

    pub fn balls(&self) -> &[Ball] {
        &self.balls
    }

    pub fn current_turn(&self) -> Player {
        self.current_turn
    }

    pub fn scores(&self) -> [u32; 2] {
        self.scores
    }

    pub fn can_shoot(&self) -> bool {
        self.can_shoot
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over
    }

    pub fn winning_player(&self) -> Option<Player> {
        self.winning_player
    }

    /// Number of ticks simulated since the last rack.
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Advance the simulation by one fixed step.
    ///
    /// Order within a tick: integrate every live ball, settle newly potted
    /// balls against the rules, resolve contacts at the new positions, then
    /// hand the table over if it has come to rest.
    pub fn tick(&mut self) -> Vec<TableEvent> {
        if self.game_over {
            return Vec::new();
        }
        self.tick += 1;

        let mut events = Vec::new();
        let mut any_moving = false;
        let mut pockets: Vec<(usize, usize)> = Vec::new();

        for (i, ball) in self.balls.iter_mut().enumerate() {
            if ball.potted {
                continue;
            }
            if let Some(pocket) = ball.advance(&self.table) {
                pockets.push((i, pocket));
            }
            if ball.is_moving() {
                any_moving = true;
            }
        }

        self.settle_pots(&pockets, &mut events);

        collision::resolve_all(&mut self.balls, &self.table);

        let next_can_shoot = !any_moving;
        if next_can_shoot && !self.can_shoot {
            events.push(TableEvent::TableAtRest);
            if !self.game_over {
                self.current_turn = self.current_turn.other();
                tracing::debug!(tick = self.tick, player = %self.current_turn, "turn changed");
                events.push(TableEvent::TurnChanged {
                    to: self.current_turn,
                });
            }
        }
        self.can_shoot = next_can_shoot;

        events
    }

    /// Apply scoring, end-of-frame and ball-in-hand rules to every pot not
    /// yet accounted for.
    fn settle_pots(&mut self, pockets: &[(usize, usize)], events: &mut Vec<TableEvent>) {
        let shooter = self.current_turn;

        for i in 0..self.balls.len() {
            let ball = &self.balls[i];
            if !ball.potted || ball.accounted {
                continue;
            }
            let color = ball.color;
            let pocket = pockets.iter().find(|(b, _)| *b == i).map(|&(_, p)| p);

            if !color.is_cue() {
                let ball = &mut self.balls[i];
                ball.accounted = true;
                if ball.potted_by.is_none() {
                    ball.potted_by = Some(shooter);
                }
                events.push(TableEvent::BallPotted {
                    ball: i,
                    color,
                    player: shooter,
                    pocket,
                });
            }

            if color.is_black() {
                let retired = self.retired_object_balls();
                let winner = rules::black_ball_winner(shooter, retired);
                let legal = winner == shooter;
                self.game_over = true;
                self.winning_player = Some(winner);
                tracing::info!(
                    tick = self.tick,
                    player = %shooter,
                    winner = %winner,
                    retired,
                    legal,
                    "black potted, game over"
                );
                events.push(TableEvent::BlackPotted {
                    player: shooter,
                    winner,
                    legal,
                });
            } else if color.is_object() {
                self.scores[shooter.index()] += 1;
                tracing::debug!(tick = self.tick, ball = i, player = %shooter, "object ball potted");
            } else {
                let spot = rules::find_respot(&self.balls, i, &self.table);
                let cue = &mut self.balls[i];
                cue.potted = false;
                cue.potted_by = None;
                cue.accounted = false;
                cue.x = spot.x;
                cue.y = spot.y;
                cue.velocity = 0.0;
                cue.angle = 0.0;
                tracing::debug!(tick = self.tick, x = spot.x, y = spot.y, "cue ball respotted");
                events.push(TableEvent::CueBallRespotted {
                    x: spot.x,
                    y: spot.y,
                });
            }
        }
    }

    fn retired_object_balls(&self) -> usize {
        self.balls
            .iter()
            .filter(|b| b.potted && b.color.is_object())
            .count()
    }

    /// Strike the cue ball. Returns `false`, leaving the state untouched,
    /// when the table is still live, the frame is over, the input is not a
    /// finite non-negative power, or there is no cue ball on the cloth.
    pub fn shoot(&mut self, angle: f64, power: f64) -> bool {
        if !self.can_shoot || self.game_over {
            return false;
        }
        if !angle.is_finite() || !power.is_finite() || power < 0.0 {
            tracing::debug!(angle, power, "rejected shot with invalid parameters");
            return false;
        }
        let Some(cue) = self
            .balls
            .iter_mut()
            .find(|b| b.color.is_cue() && !b.potted)
        else {
            tracing::warn!(tick = self.tick, "no cue ball on the table, shot ignored");
            return false;
        };

        cue.velocity = power;
        cue.angle = angle;
        self.can_shoot = false;
        tracing::debug!(tick = self.tick, player = %self.current_turn, angle, power, "shot taken");
        true
    }

    /// Discard the frame and rack again on the same table.
    pub fn restart(&mut self) {
        tracing::info!(tick = self.tick, "restarting frame");
        *self = Self::with_table(self.table);
    }

    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            balls: self.balls.clone(),
            current_turn: self.current_turn,
            scores: self.scores,
            potted_balls: self.balls.iter().filter(|b| b.accounted).cloned().collect(),
            can_shoot: self.can_shoot,
            game_over: self.game_over,
            winning_player: self.winning_player,
            tick: self.tick,
        }
    }
}

impl Default for EightBall {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use super::*;
    use crate::table::Point;

    /// Index of the cue ball in a freshly racked game.
    pub const CUE: usize = RACK.len();

    /// Index of the black ball in a freshly racked game.
    pub const BLACK: usize = 7;

    /// Run `n` ticks, returning all accumulated events.
    pub fn run_ticks(game: &mut EightBall, n: usize) -> Vec<TableEvent> {
        let mut events = Vec::new();
        for _ in 0..n {
            events.extend(game.tick());
        }
        events
    }

    /// Tick until the table is ready for the next shot or the frame ends.
    ///
    /// Panics if that takes more than `max_ticks`.
    pub fn run_until_rest(game: &mut EightBall, max_ticks: usize) -> Vec<TableEvent> {
        let mut events = Vec::new();
        for _ in 0..max_ticks {
            events.extend(game.tick());
            if game.can_shoot() || game.is_game_over() {
                return events;
            }
        }
        panic!("table still moving after {max_ticks} ticks");
    }

    /// Move a ball without touching its velocity.
    pub fn place_ball(game: &mut EightBall, index: usize, at: Point) {
        let ball = &mut game.balls[index];
        ball.x = at.x;
        ball.y = at.y;
    }

    pub fn set_velocity(game: &mut EightBall, index: usize, velocity: f64, angle: f64) {
        let ball = &mut game.balls[index];
        ball.velocity = velocity;
        ball.angle = angle;
    }

    /// Mark a ball as potted and already settled, taking it out of play
    /// without scoring it.
    pub fn retire_ball(game: &mut EightBall, index: usize) {
        let ball = &mut game.balls[index];
        ball.potted = true;
        ball.accounted = true;
        ball.velocity = 0.0;
    }

    /// Retire every object ball (all but cue and black).
    pub fn retire_object_balls(game: &mut EightBall) {
        for i in 0..game.balls.len() {
            if game.balls[i].color.is_object() {
                retire_ball(game, i);
            }
        }
    }

    /// Lock the table as if a shot were in progress, without moving the cue.
    pub fn begin_shot(game: &mut EightBall) {
        game.can_shoot = false;
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;

    use super::test_helpers::*;
    use super::*;
    use crate::table::Point;

    fn count<F: Fn(&TableEvent) -> bool>(events: &[TableEvent], f: F) -> usize {
        events.iter().filter(|e| f(e)).count()
    }

    #[test]
    fn new_game_racks_sixteen_balls() {
        let game = EightBall::new();
        assert_eq!(game.balls().len(), 16);
        let cue = &game.balls()[CUE];
        assert!(cue.color.is_cue());
        assert_eq!(cue.position(), Point::new(200.0, 200.0));
        assert!(game.balls()[BLACK].color.is_black());
        assert_eq!(game.current_turn(), Player::One);
        assert_eq!(game.scores(), [0, 0]);
        assert!(game.can_shoot());
        assert!(!game.is_game_over());
        assert_eq!(game.winning_player(), None);
    }

    #[test]
    fn idle_ticks_change_nothing_but_the_counter() {
        let mut game = EightBall::new();
        let before = game.snapshot();
        let events = run_ticks(&mut game, 10);
        assert!(events.is_empty());
        let after = game.snapshot();
        assert_eq!(after.tick, 10);
        assert_eq!(after.balls, before.balls);
        assert_eq!(after.current_turn, Player::One);
    }

    #[test]
    fn break_shot_hands_table_to_player_two() {
        let mut game = EightBall::new();
        assert!(game.shoot(0.0, 10.0));
        assert!(!game.can_shoot());

        let events = run_until_rest(&mut game, 10_000);

        if !game.is_game_over() {
            assert!(game.can_shoot());
            assert_eq!(game.current_turn(), Player::Two);
            assert_eq!(count(&events, |e| matches!(e, TableEvent::TurnChanged { .. })), 1);
        }
        for ball in game.balls() {
            assert_eq!(ball.velocity, 0.0);
        }
    }

    #[test]
    fn missed_shot_flips_turn_exactly_once() {
        let mut game = EightBall::new();
        // Away from the rack: off the left rail and back, stopping short.
        assert!(game.shoot(PI, 10.0));

        let events = run_ticks(&mut game, 2000);

        assert_eq!(game.current_turn(), Player::Two);
        assert_eq!(game.scores(), [0, 0]);
        assert!(game.can_shoot());
        assert_eq!(
            count(&events, |e| matches!(e, TableEvent::TurnChanged { to: Player::Two })),
            1
        );
        assert_eq!(count(&events, |e| matches!(e, TableEvent::TableAtRest)), 1);
        assert!(game.balls()[CUE].x < 380.0);
    }

    #[test]
    fn turn_does_not_flip_while_balls_move() {
        let mut game = EightBall::new();
        game.shoot(PI, 10.0);
        for _ in 0..50 {
            game.tick();
            assert_eq!(game.current_turn(), Player::One);
            assert!(!game.can_shoot());
        }
    }

    #[test]
    fn scratch_respots_cue_in_the_same_tick() {
        let mut game = EightBall::new();
        place_ball(&mut game, CUE, Point::new(400.0, 25.0));
        assert!(game.shoot(-PI / 2.0, 10.0));

        let events = game.tick();

        assert!(events.contains(&TableEvent::CueBallRespotted { x: 100.0, y: 200.0 }));
        let cue = &game.balls()[CUE];
        assert!(!cue.potted);
        assert_eq!(cue.velocity, 0.0);
        assert_eq!(cue.potted_by, None);
        assert_eq!(cue.position(), Point::new(100.0, 200.0));
        assert_eq!(game.scores(), [0, 0]);
        assert!(game.snapshot().potted_balls.is_empty());
    }

    #[test]
    fn scratch_respot_avoids_occupied_spot() {
        let mut game = EightBall::new();
        place_ball(&mut game, 0, Point::new(100.0, 200.0));
        place_ball(&mut game, CUE, Point::new(400.0, 25.0));
        game.shoot(-PI / 2.0, 10.0);

        game.tick();

        assert_eq!(game.balls()[CUE].position(), Point::new(120.0, 200.0));
    }

    #[test]
    fn every_scratch_is_handled() {
        let mut game = EightBall::new();
        for _ in 0..2 {
            place_ball(&mut game, CUE, Point::new(400.0, 25.0));
            assert!(game.shoot(-PI / 2.0, 10.0));
            let events = game.tick();
            assert_eq!(
                count(&events, |e| matches!(e, TableEvent::CueBallRespotted { .. })),
                1
            );
            assert!(!game.balls()[CUE].potted);
            assert!(game.can_shoot());
        }
    }

    #[test]
    fn object_ball_scores_exactly_once() {
        let mut game = EightBall::new();
        assert!(game.shoot(0.0, 0.0));
        place_ball(&mut game, 1, Point::new(400.0, 25.0));
        set_velocity(&mut game, 1, 10.0, -PI / 2.0);

        let mut events = game.tick();
        assert_eq!(game.scores(), [1, 0]);
        assert_eq!(game.balls()[1].potted_by, Some(Player::One));

        events.extend(run_ticks(&mut game, 100));
        assert_eq!(game.scores(), [1, 0]);
        assert_eq!(game.balls()[1].potted_by, Some(Player::One));
        assert_eq!(
            count(&events, |e| matches!(e, TableEvent::BallPotted { .. })),
            1
        );
        assert!(events.contains(&TableEvent::BallPotted {
            ball: 1,
            color: BallColor::Blue,
            player: Player::One,
            pocket: Some(1),
        }));
        assert_eq!(game.snapshot().potted_balls.len(), 1);
    }

    #[test]
    fn pot_credits_the_shooter_not_the_next_player() {
        let mut game = EightBall::new();
        begin_shot(&mut game);
        place_ball(&mut game, 2, Point::new(20.0, 20.0));
        set_velocity(&mut game, 2, 10.0, -PI * 0.75);

        game.tick();

        // Table rested this tick, so the turn has already moved on.
        assert_eq!(game.current_turn(), Player::Two);
        assert_eq!(game.scores(), [1, 0]);
        assert_eq!(game.balls()[2].potted_by, Some(Player::One));
    }

    #[test]
    fn early_black_hands_win_to_opponent() {
        let mut game = EightBall::new();
        begin_shot(&mut game);
        place_ball(&mut game, BLACK, Point::new(400.0, 25.0));
        set_velocity(&mut game, BLACK, 10.0, -PI / 2.0);

        let events = game.tick();

        assert!(game.is_game_over());
        assert_eq!(game.winning_player(), Some(Player::Two));
        assert!(events.contains(&TableEvent::BlackPotted {
            player: Player::One,
            winner: Player::Two,
            legal: false,
        }));
        assert_eq!(game.balls()[BLACK].potted_by, Some(Player::One));
        assert_eq!(game.scores(), [0, 0]);
        // Game over: no turn change even though the table is at rest.
        assert_eq!(game.current_turn(), Player::One);
    }

    #[test]
    fn black_after_clearing_wins_for_shooter() {
        let mut game = EightBall::new();
        retire_object_balls(&mut game);
        begin_shot(&mut game);
        place_ball(&mut game, BLACK, Point::new(400.0, 25.0));
        set_velocity(&mut game, BLACK, 10.0, -PI / 2.0);

        let events = game.tick();

        assert_eq!(game.winning_player(), Some(Player::One));
        assert!(events.contains(&TableEvent::BlackPotted {
            player: Player::One,
            winner: Player::One,
            legal: true,
        }));
    }

    #[test]
    fn game_over_freezes_the_table() {
        let mut game = EightBall::new();
        begin_shot(&mut game);
        place_ball(&mut game, BLACK, Point::new(400.0, 25.0));
        set_velocity(&mut game, BLACK, 10.0, -PI / 2.0);
        set_velocity(&mut game, 0, 5.0, PI / 2.0);
        game.tick();
        assert!(game.is_game_over());

        let frozen = game.snapshot();
        assert!(game.tick().is_empty());
        assert!(!game.shoot(0.0, 5.0));
        assert_eq!(game.snapshot(), frozen);
    }

    #[test]
    fn shoot_rejected_while_table_is_live() {
        let mut game = EightBall::new();
        assert!(game.shoot(PI, 10.0));
        game.tick();
        let before = game.snapshot();
        assert!(!game.shoot(0.0, 30.0));
        assert_eq!(game.snapshot(), before);
    }

    #[test]
    fn shoot_rejects_invalid_numbers() {
        let mut game = EightBall::new();
        let before = game.snapshot();
        assert!(!game.shoot(f64::NAN, 5.0));
        assert!(!game.shoot(0.0, f64::INFINITY));
        assert!(!game.shoot(0.0, -1.0));
        assert_eq!(game.snapshot(), before);
        assert!(game.can_shoot());
    }

    #[test]
    fn shoot_without_cue_ball_is_a_no_op() {
        let mut game = EightBall::new();
        retire_ball(&mut game, CUE);
        let before = game.snapshot();
        assert!(!game.shoot(0.0, 5.0));
        assert_eq!(game.snapshot(), before);
        assert!(game.can_shoot());
    }

    #[test]
    fn restart_restores_initial_rack() {
        let mut game = EightBall::new();
        game.shoot(0.0, 25.0);
        run_ticks(&mut game, 300);
        retire_ball(&mut game, 3);

        game.restart();

        assert_eq!(game.snapshot(), EightBall::new().snapshot());
        for (ball, (color, at)) in game.balls().iter().zip(RACK.iter()) {
            assert_eq!(ball.color, *color);
            assert_eq!(ball.position(), *at);
        }
    }

    #[test]
    fn restart_keeps_custom_table() {
        let table = TableConfig {
            friction: 0.5,
            ..TableConfig::default()
        };
        let mut game = EightBall::with_table(table);
        game.restart();
        assert_eq!(game.table().friction, 0.5);
    }

    #[test]
    fn snapshot_uses_wire_field_names() {
        let game = EightBall::new();
        let json = serde_json::to_value(game.snapshot()).unwrap();
        assert_eq!(json["currentTurn"], 1);
        assert_eq!(json["winningPlayer"], 0);
        assert_eq!(json["canShoot"], true);
        assert_eq!(json["gameOver"], false);
        assert_eq!(json["scores"], serde_json::json!([0, 0]));
        assert_eq!(json["pottedBalls"], serde_json::json!([]));
        assert_eq!(json["balls"].as_array().map(Vec::len), Some(16));
    }

    #[test]
    fn snapshot_survives_msgpack() {
        use cueball_core::net::protocol::{decode_snapshot_msgpack, encode_snapshot_msgpack};

        let mut game = EightBall::new();
        begin_shot(&mut game);
        place_ball(&mut game, 1, Point::new(400.0, 25.0));
        set_velocity(&mut game, 1, 10.0, -PI / 2.0);
        game.tick();

        let snapshot = game.snapshot();
        let bytes = encode_snapshot_msgpack(&snapshot).unwrap();
        let back: GameSnapshot = decode_snapshot_msgpack(&bytes).unwrap();
        assert_eq!(back, snapshot);
        assert_eq!(back.potted_balls.len(), 1);
    }

    // ================================================================
    // Property-based tests (proptest)
    // ================================================================

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(32))]

            #[test]
            fn rules_stay_consistent_through_a_shot(
                angle in -PI..PI,
                power in 0.0f64..40.0,
            ) {
                let mut game = EightBall::new();
                prop_assert!(game.shoot(angle, power));

                for _ in 0..3000 {
                    game.tick();

                    let cue = &game.balls()[CUE];
                    prop_assert!(!cue.potted, "cue ball must be back on the cloth");
                    prop_assert!(game.balls().iter().all(|b| b.velocity >= 0.0));

                    let potted_objects = game
                        .balls()
                        .iter()
                        .filter(|b| b.potted && b.color.is_object())
                        .count() as u32;
                    prop_assert_eq!(game.scores()[0] + game.scores()[1], potted_objects);

                    if game.can_shoot() || game.is_game_over() {
                        break;
                    }
                }
            }
        }
    }
}
