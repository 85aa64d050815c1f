//! Dice rolling system.
//!
//! Supports `NdM+K` notation, advantage/disadvantage, critical damage
//! doubling, and the two-phase reveal contract: a checked roll is computed
//! immediately but handed back as a [`Pending`] value that may only be
//! opened once the animation window has elapsed.

use crate::config::Settings;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Largest number of dice a single expression may throw.
pub const MAX_DICE: u32 = 100;

/// Largest die size accepted by the parser.
pub const MAX_SIDES: u32 = 1000;

/// Error type for dice parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiceError {
    #[error("Invalid dice notation: {0}")]
    InvalidNotation(String),
    #[error("Invalid die size: {0}")]
    InvalidDieSize(u32),
    #[error("No dice specified")]
    NoDice,
    #[error("Too many dice: {count} (in {notation})")]
    TooManyDice { count: u32, notation: String },
}

/// Advantage state for d20 rolls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Advantage {
    #[default]
    Normal,
    Advantage,
    Disadvantage,
}

impl Advantage {
    /// Combine two advantage states (advantage + disadvantage = normal).
    pub fn combine(self, other: Advantage) -> Advantage {
        match (self, other) {
            (Advantage::Normal, x) | (x, Advantage::Normal) => x,
            (Advantage::Advantage, Advantage::Disadvantage) => Advantage::Normal,
            (Advantage::Disadvantage, Advantage::Advantage) => Advantage::Normal,
            (Advantage::Advantage, Advantage::Advantage) => Advantage::Advantage,
            (Advantage::Disadvantage, Advantage::Disadvantage) => Advantage::Disadvantage,
        }
    }

    /// Build from the pair of flags UI code tends to carry around.
    pub fn from_flags(advantage: bool, disadvantage: bool) -> Advantage {
        match (advantage, disadvantage) {
            (true, false) => Advantage::Advantage,
            (false, true) => Advantage::Disadvantage,
            _ => Advantage::Normal,
        }
    }
}

// ============================================================================
// Expressions
// ============================================================================

/// A parsed `NdM+K` expression. A pure constant has `count == 0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceExpression {
    pub count: u32,
    pub sides: u32,
    pub modifier: i32,
    pub original: String,
}

impl DiceExpression {
    /// Parse a dice notation string such as `2d6+3`, `d20`, `1d8-1` or `4`.
    pub fn parse(notation: &str) -> Result<Self, DiceError> {
        let normalized: String = notation
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        if normalized.is_empty() {
            return Err(DiceError::NoDice);
        }

        let mut dice: Option<(u32, u32)> = None;
        let mut modifier: i32 = 0;
        let mut current = String::new();
        let mut sign: i32 = 1;

        for (idx, ch) in normalized.chars().enumerate() {
            match ch {
                '+' | '-' => {
                    if current.is_empty() && idx != 0 {
                        return Err(DiceError::InvalidNotation(normalized));
                    }
                    if !current.is_empty() {
                        Self::parse_term(&current, sign, &normalized, &mut dice, &mut modifier)?;
                        current.clear();
                    }
                    sign = if ch == '+' { 1 } else { -1 };
                }
                _ => current.push(ch),
            }
        }

        if current.is_empty() {
            return Err(DiceError::InvalidNotation(normalized));
        }
        Self::parse_term(&current, sign, &normalized, &mut dice, &mut modifier)?;

        let (count, sides) = dice.unwrap_or((0, 0));
        Ok(DiceExpression {
            count,
            sides,
            modifier,
            original: normalized,
        })
    }

    fn parse_term(
        term: &str,
        sign: i32,
        notation: &str,
        dice: &mut Option<(u32, u32)>,
        modifier: &mut i32,
    ) -> Result<(), DiceError> {
        let invalid = || DiceError::InvalidNotation(notation.to_string());

        if let Some(d_pos) = term.find('d') {
            // Only one dice term, and it may not be subtracted
            if dice.is_some() || sign < 0 {
                return Err(invalid());
            }

            let count_str = &term[..d_pos];
            let sides_str = &term[d_pos + 1..];

            let count: u32 = if count_str.is_empty() {
                1
            } else {
                count_str.parse().map_err(|_| invalid())?
            };
            let sides: u32 = sides_str.parse().map_err(|_| invalid())?;

            if count == 0 {
                return Err(DiceError::NoDice);
            }
            if count > MAX_DICE {
                return Err(DiceError::TooManyDice {
                    count,
                    notation: notation.to_string(),
                });
            }
            if sides == 0 || sides > MAX_SIDES {
                return Err(DiceError::InvalidDieSize(sides));
            }

            *dice = Some((count, sides));
        } else {
            let value: i32 = term.parse().map_err(|_| invalid())?;
            *modifier += sign * value;
        }

        Ok(())
    }

    pub fn is_constant(&self) -> bool {
        self.count == 0
    }

    /// The same expression with twice the dice and the same flat modifier.
    pub fn with_doubled_dice(&self) -> DiceExpression {
        DiceExpression {
            count: self.count * 2,
            sides: self.sides,
            modifier: self.modifier,
            original: self.original.clone(),
        }
    }

    /// Smallest possible total.
    pub fn minimum(&self) -> i32 {
        self.count as i32 + self.modifier
    }

    /// Largest possible total.
    pub fn maximum(&self) -> i32 {
        (self.count * self.sides) as i32 + self.modifier
    }
}

impl FromStr for DiceExpression {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DiceExpression::parse(s)
    }
}

impl fmt::Display for DiceExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_constant() {
            return write!(f, "{}", self.modifier);
        }
        write!(f, "{}d{}", self.count, self.sides)?;
        match self.modifier {
            0 => Ok(()),
            m if m > 0 => write!(f, "+{m}"),
            m => write!(f, "{m}"),
        }
    }
}

/// Result of evaluating a [`DiceExpression`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceRoll {
    pub rolls: Vec<u32>,
    pub total: i32,
    pub modifier: i32,
    pub count: u32,
    pub sides: u32,
}

impl DiceRoll {
    /// Format the individual dice for display, e.g. `[3, 5] + 2`.
    pub fn dice_display(&self) -> String {
        let dice = format!(
            "[{}]",
            self.rolls
                .iter()
                .map(|r| r.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
        match self.modifier {
            0 => dice,
            m if m > 0 => format!("{dice} + {m}"),
            m => format!("{dice} - {}", m.abs()),
        }
    }
}

impl fmt::Display for DiceRoll {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.dice_display(), self.total)
    }
}

// ============================================================================
// Checked Rolls
// ============================================================================

/// Outcome of a single-die check (attack roll, skill check, saving throw).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollResult {
    /// The die that counts: the only die, or the kept one of two.
    pub roll: u32,
    /// Every die thrown, in order.
    pub rolls: Vec<u32>,
    pub modifier: i32,
    pub total: i32,
    pub sides: u32,
    pub dc: Option<i32>,
    pub success: Option<bool>,
    pub critical: bool,
    pub critical_failure: bool,
    pub label: String,
}

impl RollResult {
    /// Check if the roll meets or exceeds a DC.
    pub fn meets_dc(&self, dc: i32) -> bool {
        self.total >= dc
    }

    pub fn succeeded(&self) -> bool {
        self.success.unwrap_or(false)
    }
}

impl fmt::Display for RollResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.modifier < 0 { '-' } else { '+' };
        write!(
            f,
            "{}: d{} {} {} {} = {}",
            self.label,
            self.sides,
            self.roll,
            sign,
            self.modifier.abs(),
            self.total
        )?;
        if let Some(dc) = self.dc {
            write!(f, " vs DC {dc}")?;
        }
        Ok(())
    }
}

/// Two dice of which one was kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeptRoll {
    pub kept: u32,
    pub rolls: Vec<u32>,
}

/// A roll whose outcome must not be acted on until its reveal delay passes.
#[must_use = "a pending roll does nothing until it is revealed"]
#[derive(Debug)]
pub struct Pending<T> {
    value: T,
    delay: Duration,
}

impl<T> Pending<T> {
    pub(crate) fn new(value: T, delay: Duration) -> Self {
        Self { value, delay }
    }

    /// How long the host must wait before revealing.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn is_immediate(&self) -> bool {
        self.delay.is_zero()
    }

    /// Wait out the reveal delay, then hand back the outcome.
    pub async fn reveal(self) -> T {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.value
    }

    /// Open the roll without waiting. Hosts that schedule their own timers
    /// call this once [`Pending::delay`] has elapsed.
    pub fn reveal_now(self) -> T {
        self.value
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Pending<U> {
        Pending {
            value: f(self.value),
            delay: self.delay,
        }
    }

    pub(crate) fn into_parts(self) -> (T, Duration) {
        (self.value, self.delay)
    }
}

// ============================================================================
// Dice Sources
// ============================================================================

/// Source of individual die results.
pub trait DiceSource {
    /// A uniform value in `1..=sides`.
    fn roll_die(&mut self, sides: u32) -> u32;
}

/// [`DiceSource`] backed by a `rand` RNG.
#[derive(Debug, Clone)]
pub struct RandomDice<R = StdRng> {
    rng: R,
}

impl RandomDice<StdRng> {
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic dice for replays and tests.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl<R: Rng> RandomDice<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: Rng> DiceSource for RandomDice<R> {
    fn roll_die(&mut self, sides: u32) -> u32 {
        self.rng.gen_range(1..=sides.max(1))
    }
}

/// Presentation hook fired for every checked roll.
pub trait RollObserver {
    fn on_dice_roll(&mut self, result: &RollResult);
}

// ============================================================================
// Dice Engine
// ============================================================================

/// Rolls dice and stamps checked rolls with the configured reveal delay.
pub struct DiceEngine {
    source: Box<dyn DiceSource>,
    reveal_delay: Duration,
    observer: Option<Box<dyn RollObserver>>,
}

impl DiceEngine {
    pub fn new(source: impl DiceSource + 'static, settings: &Settings) -> Self {
        Self {
            source: Box::new(source),
            reveal_delay: settings.reveal_delay(),
            observer: None,
        }
    }

    /// Engine backed by an entropy-seeded RNG.
    pub fn random(settings: &Settings) -> Self {
        Self::new(RandomDice::from_entropy(), settings)
    }

    pub fn with_observer(mut self, observer: Box<dyn RollObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn set_observer(&mut self, observer: Box<dyn RollObserver>) {
        self.observer = Some(observer);
    }

    pub fn apply_settings(&mut self, settings: &Settings) {
        self.reveal_delay = settings.reveal_delay();
    }

    pub fn reveal_delay(&self) -> Duration {
        self.reveal_delay
    }

    fn roll_die(&mut self, sides: u32) -> u32 {
        let sides = sides.max(1);
        self.source.roll_die(sides).clamp(1, sides)
    }

    /// `count` independent dice with `sides` faces.
    pub fn roll(&mut self, sides: u32, count: u32) -> Vec<u32> {
        if sides == 0 {
            return Vec::new();
        }
        (0..count).map(|_| self.roll_die(sides)).collect()
    }

    /// Roll a parsed expression.
    pub fn evaluate(&mut self, expr: &DiceExpression) -> DiceRoll {
        let rolls = self.roll(expr.sides, expr.count);
        let dice_total: i32 = rolls.iter().map(|r| *r as i32).sum();
        DiceRoll {
            total: dice_total + expr.modifier,
            rolls,
            modifier: expr.modifier,
            count: expr.count,
            sides: expr.sides,
        }
    }

    /// Parse and roll a notation string.
    pub fn roll_expression(&mut self, notation: &str) -> Result<DiceRoll, DiceError> {
        let expr = DiceExpression::parse(notation)?;
        Ok(self.evaluate(&expr))
    }

    /// Roll damage. A critical hit doubles the number of dice, not the
    /// flat modifier.
    pub fn roll_damage(&mut self, notation: &str, is_critical: bool) -> Result<DiceRoll, DiceError> {
        let expr = DiceExpression::parse(notation)?;
        let expr = if is_critical {
            expr.with_doubled_dice()
        } else {
            expr
        };
        Ok(self.evaluate(&expr))
    }

    /// Roll one die, or two and keep one under advantage/disadvantage.
    pub fn roll_kept(&mut self, sides: u32, advantage: Advantage) -> KeptRoll {
        match advantage {
            Advantage::Normal => {
                let roll = self.roll_die(sides);
                KeptRoll {
                    kept: roll,
                    rolls: vec![roll],
                }
            }
            Advantage::Advantage | Advantage::Disadvantage => {
                let first = self.roll_die(sides);
                let second = self.roll_die(sides);
                let kept = if advantage == Advantage::Advantage {
                    first.max(second)
                } else {
                    first.min(second)
                };
                KeptRoll {
                    kept,
                    rolls: vec![first, second],
                }
            }
        }
    }

    /// Two d20s, keep the higher.
    pub fn roll_advantage(&mut self) -> KeptRoll {
        self.roll_kept(20, Advantage::Advantage)
    }

    /// Two d20s, keep the lower.
    pub fn roll_disadvantage(&mut self) -> KeptRoll {
        self.roll_kept(20, Advantage::Disadvantage)
    }

    /// Roll a check and hand it back behind the reveal delay.
    ///
    /// The observer sees the result straight away so it can start
    /// animating; everyone else waits for [`Pending::reveal`].
    pub fn roll_checked(
        &mut self,
        sides: u32,
        modifier: i32,
        label: impl Into<String>,
        dc: Option<i32>,
        advantage: Advantage,
    ) -> Pending<RollResult> {
        self.roll_judged(sides, modifier, label.into(), dc, advantage, |result| {
            result.dc.map(|dc| result.total >= dc)
        })
    }

    /// A d20 attack against `target_ac`. A natural 20 always hits and a
    /// natural 1 always misses; `success` carries the verdict.
    pub fn roll_attack(
        &mut self,
        modifier: i32,
        target_ac: i32,
        label: impl Into<String>,
        advantage: Advantage,
    ) -> Pending<RollResult> {
        self.roll_judged(20, modifier, label.into(), Some(target_ac), advantage, |result| {
            Some(if result.critical {
                true
            } else if result.critical_failure {
                false
            } else {
                result.total >= target_ac
            })
        })
    }

    fn roll_judged(
        &mut self,
        sides: u32,
        modifier: i32,
        label: String,
        dc: Option<i32>,
        advantage: Advantage,
        judge: impl FnOnce(&RollResult) -> Option<bool>,
    ) -> Pending<RollResult> {
        let sides = sides.max(1);
        let KeptRoll { kept, rolls } = self.roll_kept(sides, advantage);
        let total = kept as i32 + modifier;

        let mut result = RollResult {
            roll: kept,
            rolls,
            modifier,
            total,
            sides,
            dc,
            success: None,
            critical: kept == sides,
            critical_failure: kept == 1,
            label,
        };
        result.success = judge(&result);

        tracing::debug!(
            label = %result.label,
            roll = result.roll,
            total = result.total,
            dc = ?result.dc,
            success = ?result.success,
            "Checked roll"
        );

        // Notified only once the verdict is final.
        if let Some(observer) = self.observer.as_mut() {
            observer.on_dice_roll(&result);
        }

        Pending::new(result, self.reveal_delay)
    }
}

impl fmt::Debug for DiceEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiceEngine")
            .field("reveal_delay", &self.reveal_delay)
            .field("has_observer", &self.observer.is_some())
            .finish()
    }
}
