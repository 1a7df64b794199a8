//! Celebration effects.
//!
//! The visual effect itself belongs to the host (a browser animation, a
//! terminal banner). This module owns its lifetime: a celebration is a scoped
//! resource that is started once, emits a bounded number of bursts, and is
//! stopped exactly once, whether it runs to the end, is cancelled, or is
//! dropped early because the learner navigated away.

use serde::{Deserialize, Serialize};

use crate::config::CelebrationConfig;

/// Which celebration to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CelebrationKind {
    /// Short burst for an excellent scenario answer.
    Confetti,
    /// Elaborate display for a high-scoring activity.
    Fireworks,
}

impl CelebrationKind {
    /// Number of bursts this kind emits under the given config.
    pub fn bursts(&self, config: &CelebrationConfig) -> u32 {
        match self {
            CelebrationKind::Confetti => config.confetti_bursts,
            CelebrationKind::Fireworks => config.fireworks_bursts,
        }
    }
}

impl std::fmt::Display for CelebrationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CelebrationKind::Confetti => write!(f, "confetti"),
            CelebrationKind::Fireworks => write!(f, "fireworks"),
        }
    }
}

/// The host's visual effect hooks.
pub trait EffectTrigger {
    /// The effect is acquired.
    fn start(&mut self, kind: CelebrationKind);

    /// One frame/burst of the effect. `index` counts from zero.
    fn burst(&mut self, kind: CelebrationKind, index: u32);

    /// The effect is released. Called exactly once per `start`.
    fn stop(&mut self, kind: CelebrationKind);
}

/// A running celebration.
///
/// Created by [`CelebrationGuard::begin`]; releases the effect when the last
/// burst fires, on [`cancel`](CelebrationGuard::cancel), or on drop.
pub struct CelebrationGuard<'a, T: EffectTrigger + ?Sized> {
    trigger: &'a mut T,
    kind: CelebrationKind,
    total: u32,
    fired: u32,
    released: bool,
}

impl<'a, T: EffectTrigger + ?Sized> CelebrationGuard<'a, T> {
    /// Acquire the effect and prepare `bursts` bursts.
    pub fn begin(trigger: &'a mut T, kind: CelebrationKind, bursts: u32) -> Self {
        trigger.start(kind);
        let mut guard = Self {
            trigger,
            kind,
            total: bursts,
            fired: 0,
            released: false,
        };
        if bursts == 0 {
            guard.release();
        }
        guard
    }

    /// Acquire the effect with the burst count configured for `kind`.
    pub fn with_config(trigger: &'a mut T, kind: CelebrationKind, config: &CelebrationConfig) -> Self {
        Self::begin(trigger, kind, kind.bursts(config))
    }

    /// Fire the next burst. Returns whether the celebration is still running.
    pub fn tick(&mut self) -> bool {
        if self.released {
            return false;
        }

        self.trigger.burst(self.kind, self.fired);
        self.fired += 1;

        if self.fired >= self.total {
            self.release();
        }
        !self.released
    }

    /// Fire every remaining burst and release.
    pub fn run_to_end(mut self) -> u32 {
        while self.tick() {}
        self.fired
    }

    /// Stop early and release the effect.
    pub fn cancel(mut self) {
        self.release();
    }

    /// Whether the effect is still held.
    pub fn is_running(&self) -> bool {
        !self.released
    }

    /// Number of bursts fired so far.
    pub fn fired(&self) -> u32 {
        self.fired
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.trigger.stop(self.kind);
        }
    }
}

impl<T: EffectTrigger + ?Sized> Drop for CelebrationGuard<'_, T> {
    fn drop(&mut self) {
        self.release();
    }
}
