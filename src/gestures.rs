use std::fmt::{Display, Formatter};
use crate::config::Geometry;
use crate::tracker::TouchSample;
use crate::tunables::GestureConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Wake,
    Sleep,
}

impl Display for Trigger {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Wake => write!(f, "ON"),
            Self::Sleep => write!(f, "OFF"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScreenPowerState {
    Suspended,
    #[default]
    Active,
}

/// Progress of one swipe through its corridor. Stages only move forward within a contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Stage {
    #[default]
    Idle,
    Stage0Latched,
    Stage1Latched,
    Fired,
}

/// Open interval; a missing bound is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Band {
    pub above: Option<i32>,
    pub below: Option<i32>,
}

impl Band {
    fn between(above: i32, below: i32) -> Self {
        Self { above: Some(above), below: Some(below) }
    }

    fn above(above: i32) -> Self {
        Self { above: Some(above), below: None }
    }

    fn below(below: i32) -> Self {
        Self { above: None, below: Some(below) }
    }

    pub fn contains(&self, v: i32) -> bool {
        self.above.is_none_or(|a| v > a) && self.below.is_none_or(|b| v < b)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Zone {
    pub x: Band,
    pub y: Band,
}

impl Zone {
    pub fn contains(&self, sample: TouchSample) -> bool {
        self.x.contains(sample.x) && self.y.contains(sample.y)
    }
}

/// Two columns a swipe has to cross in order, then the zone that fires it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Corridor {
    pub stages: [Zone; 2],
    pub fire: Zone,
}

impl Corridor {
    /// Moves `stage` forward as far as `sample` allows and reports whether the fire zone is reached.
    /// Latched stages stay latched even when later samples leave their column.
    fn advance(&self, stage: &mut Stage, sample: TouchSample) -> bool {
        if *stage == Stage::Idle {
            if !self.stages[0].contains(sample) {
                return false;
            }
            *stage = Stage::Stage0Latched;
        }
        if *stage == Stage::Stage0Latched {
            if !self.stages[1].contains(sample) {
                return false;
            }
            *stage = Stage::Stage1Latched;
        }
        *stage == Stage::Stage1Latched && self.fire.contains(sample)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GestureState {
    pub wake: Stage,
    pub wake_r: Stage,
    pub sleep: Stage,
    pub sleep_r: Stage,
    pub screen_touched: bool,
}

impl GestureState {
    /// No corridor has fired since the last reset.
    pub fn exec_allowed(&self) -> bool {
        [self.wake, self.wake_r, self.sleep, self.sleep_r]
            .iter()
            .all(|stage| *stage != Stage::Fired)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone)]
pub struct Classifier {
    geometry: Geometry,
    wake: Corridor,
    wake_r: Corridor,
    sleep: Corridor,
    sleep_r: Corridor,
}

impl Classifier {
    pub fn new(geometry: Geometry) -> Self {
        let g = geometry;
        let wake_band = Band::above(0);
        let wake_r_band = Band::below(g.y_max);
        let sleep_band = Band::above(g.y_limit());
        let right_edge = g.x_max - g.x_final;

        Self {
            geometry,
            // Suspended, left to right across the whole screen.
            wake: Corridor {
                stages: [
                    Zone { x: Band::between(0, g.b1()), y: wake_band },
                    Zone { x: Band::between(g.b1(), g.b2()), y: wake_band },
                ],
                fire: Zone { x: Band::above(g.b2().max(right_edge)), y: wake_band },
            },
            // Suspended, right to left.
            wake_r: Corridor {
                stages: [
                    Zone { x: Band::between(g.b2(), right_edge), y: wake_r_band },
                    Zone { x: Band::between(g.b1(), g.b2()), y: wake_r_band },
                ],
                fire: Zone { x: Band::below(g.b1().min(g.x_final)), y: wake_r_band },
            },
            // Active, right to left along the bottom band.
            sleep: Corridor {
                stages: [
                    Zone { x: Band::between(g.b2(), right_edge), y: sleep_band },
                    Zone { x: Band::between(g.b1(), g.b2()), y: sleep_band },
                ],
                fire: Zone { x: Band::below(g.b1().min(g.x_final)), y: sleep_band },
            },
            // Active, left to right along the bottom band.
            sleep_r: Corridor {
                stages: [
                    Zone { x: Band::between(g.b0, g.b3()), y: sleep_band },
                    Zone { x: Band::between(g.b3(), g.b4()), y: sleep_band },
                ],
                fire: Zone { x: Band::above(g.b4().max(g.b5())), y: sleep_band },
            },
        }
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Runs one completed sample through the corridors eligible for `power_state`. Returns a trigger
    /// at most once between resets of `state`; later calls still advance the stages.
    pub fn classify(
        &self,
        sample: TouchSample,
        power_state: ScreenPowerState,
        config: &GestureConfig,
        state: &mut GestureState,
    ) -> Option<Trigger> {
        if config.debug_logging {
            log::info!("x: {}, y: {}", sample.x, sample.y);
        }

        let mut exec_allowed = state.exec_allowed();
        let (trigger, corridors) = match power_state {
            ScreenPowerState::Suspended if config.wake_enabled => (
                Trigger::Wake,
                [(&self.wake, &mut state.wake), (&self.wake_r, &mut state.wake_r)],
            ),
            ScreenPowerState::Active if config.sleep_enabled => {
                state.screen_touched = true;
                (
                    Trigger::Sleep,
                    [(&self.sleep, &mut state.sleep), (&self.sleep_r, &mut state.sleep_r)],
                )
            }
            _ => return None,
        };

        let mut fired = None;
        for (corridor, stage) in corridors {
            if corridor.advance(stage, sample) && exec_allowed {
                *stage = Stage::Fired;
                exec_allowed = false;
                fired = Some(trigger);
                log::info!("{}", trigger);
            }
        }
        fired
    }
}
