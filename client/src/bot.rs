//! Synthetic player that wanders a circular patch of the arena.
//!
//! The bot is a pure state machine driven by `tick()`; the binary in
//! `bin/bot.rs` owns the network side and forwards the bot's pose upstream
//! on the regular push cadence.

use rand::Rng;

use brawl_shared::protocol::Rotation;

/// Colors the bot picks from when it repaints itself.
pub const BOT_COLORS: [&str; 5] = ["#ff4f4f", "#ffb14f", "#7dde4f", "#4fd2ff", "#b44fff"];

/// Radius of the patch the bot wanders inside, in world units.
pub const WANDER_RADIUS: f64 = 20.0;

const MIN_SPEED: f64 = 1.5;
const MAX_SPEED: f64 = 4.0;
const MAX_TURN_RATE: f64 = 0.8;
const MIN_RETARGET_SECS: f64 = 2.0;
const MAX_RETARGET_SECS: f64 = 6.0;
const MIN_RECOLOR_SECS: f64 = 15.0;
const MAX_RECOLOR_SECS: f64 = 45.0;

/// A wandering player. Walks on the y=0 plane, curving gently until the next
/// retarget, and occasionally decides to change color.
#[derive(Debug)]
pub struct WanderBot {
    position: [f64; 3],
    heading: f64,
    speed: f64,
    turn_rate: f64,
    retarget_in: f64,
    recolor_in: f64,
    color: String,
    name: String,
}

impl WanderBot {
    pub fn new(name: String, rng: &mut impl Rng) -> Self {
        let spawn_angle = rng.gen::<f64>() * std::f64::consts::TAU;
        let spawn_dist = rng.gen::<f64>() * WANDER_RADIUS * 0.5;
        Self {
            position: [
                spawn_angle.cos() * spawn_dist,
                0.0,
                spawn_angle.sin() * spawn_dist,
            ],
            heading: rng.gen::<f64>() * std::f64::consts::TAU,
            speed: rng.gen_range(MIN_SPEED..MAX_SPEED),
            turn_rate: rng.gen_range(-MAX_TURN_RATE..MAX_TURN_RATE),
            retarget_in: rng.gen_range(MIN_RETARGET_SECS..MAX_RETARGET_SECS),
            recolor_in: rng.gen_range(MIN_RECOLOR_SECS..MAX_RECOLOR_SECS),
            color: BOT_COLORS[rng.gen_range(0..BOT_COLORS.len())].to_string(),
            name,
        }
    }

    /// Advance the walk by `dt` seconds. Returns the new color when the bot
    /// decides to repaint; the caller forwards it as a color change.
    pub fn tick(&mut self, dt: f64, rng: &mut impl Rng) -> Option<String> {
        self.retarget_in -= dt;
        if self.retarget_in <= 0.0 {
            self.retarget_in = rng.gen_range(MIN_RETARGET_SECS..MAX_RETARGET_SECS);
            self.speed = rng.gen_range(MIN_SPEED..MAX_SPEED);
            self.turn_rate = rng.gen_range(-MAX_TURN_RATE..MAX_TURN_RATE);
        }

        self.heading += self.turn_rate * dt;
        self.position[0] += self.heading.cos() * self.speed * dt;
        self.position[2] += self.heading.sin() * self.speed * dt;

        // Past the boundary, head straight back until inside again.
        let dist = (self.position[0].powi(2) + self.position[2].powi(2)).sqrt();
        if dist > WANDER_RADIUS {
            self.heading = (-self.position[2]).atan2(-self.position[0]);
            self.turn_rate = 0.0;
        }

        self.recolor_in -= dt;
        if self.recolor_in <= 0.0 {
            self.recolor_in = rng.gen_range(MIN_RECOLOR_SECS..MAX_RECOLOR_SECS);
            let next = BOT_COLORS[rng.gen_range(0..BOT_COLORS.len())];
            if next != self.color {
                self.color = next.to_string();
                return Some(self.color.clone());
            }
        }
        None
    }

    pub fn position(&self) -> [f64; 3] {
        self.position
    }

    /// The bot faces the direction it is walking.
    pub fn rotation(&self) -> Rotation {
        Rotation::yaw(self.heading)
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn test_rng(seed: u64) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(seed)
    }

    #[test]
    fn bot_spawns_inside_the_patch() {
        for seed in 0..20 {
            let mut rng = test_rng(seed);
            let bot = WanderBot::new("w".to_string(), &mut rng);
            let [x, _, z] = bot.position();
            assert!((x * x + z * z).sqrt() <= WANDER_RADIUS);
        }
    }

    #[test]
    fn bot_moves_over_time() {
        let mut rng = test_rng(1);
        let mut bot = WanderBot::new("w".to_string(), &mut rng);
        let start = bot.position();
        for _ in 0..20 {
            bot.tick(0.05, &mut rng);
        }
        assert_ne!(start, bot.position());
    }

    #[test]
    fn bot_stays_near_the_patch() {
        let mut rng = test_rng(2);
        let mut bot = WanderBot::new("w".to_string(), &mut rng);
        for _ in 0..20_000 {
            bot.tick(0.05, &mut rng);
            let [x, _, z] = bot.position();
            let dist = (x * x + z * z).sqrt();
            assert!(dist <= WANDER_RADIUS + 1.0, "wandered out to {dist}");
        }
    }

    #[test]
    fn bot_stays_on_the_ground_plane() {
        let mut rng = test_rng(3);
        let mut bot = WanderBot::new("w".to_string(), &mut rng);
        for _ in 0..100 {
            bot.tick(0.05, &mut rng);
        }
        assert_eq!(bot.position()[1], 0.0);
    }

    #[test]
    fn rotation_is_yaw_only() {
        let mut rng = test_rng(4);
        let mut bot = WanderBot::new("w".to_string(), &mut rng);
        bot.tick(0.05, &mut rng);
        let rot = bot.rotation();
        assert!(rot.x.is_none());
        assert!(rot.z.is_none());
        assert!(rot.y.is_finite());
    }

    #[test]
    fn bot_eventually_repaints_from_the_palette() {
        let mut rng = test_rng(5);
        let mut bot = WanderBot::new("w".to_string(), &mut rng);
        let mut repaint = None;
        for _ in 0..2_000 {
            if let Some(color) = bot.tick(0.5, &mut rng) {
                repaint = Some(color);
                break;
            }
        }
        let color = repaint.expect("bot never changed color");
        assert!(BOT_COLORS.contains(&color.as_str()));
        assert_eq!(color, bot.color());
    }

    #[test]
    fn repaint_always_picks_a_different_color() {
        let mut rng = test_rng(6);
        let mut bot = WanderBot::new("w".to_string(), &mut rng);
        let mut previous = bot.color().to_string();
        let mut changes = 0;
        for _ in 0..20_000 {
            if let Some(color) = bot.tick(0.5, &mut rng) {
                assert_ne!(color, previous);
                previous = color;
                changes += 1;
            }
        }
        assert!(changes >= 2, "expected several repaints, saw {changes}");
    }

    #[test]
    fn same_seed_walks_the_same_path() {
        let mut rng_a = test_rng(7);
        let mut rng_b = test_rng(7);
        let mut a = WanderBot::new("w".to_string(), &mut rng_a);
        let mut b = WanderBot::new("w".to_string(), &mut rng_b);
        for _ in 0..200 {
            a.tick(0.05, &mut rng_a);
            b.tick(0.05, &mut rng_b);
        }
        assert_eq!(a.position(), b.position());
        assert_eq!(a.color(), b.color());
    }
}
