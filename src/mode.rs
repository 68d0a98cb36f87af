use tracing::debug;

use crate::model::Mode;

/// Side effect requested by entering a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeEffect {
    RefreshHistory,
}

#[derive(Debug, Default)]
pub struct ModeController {
    current: Mode,
}

impl ModeController {
    pub fn current(&self) -> Mode {
        self.current
    }

    pub fn is_visible(&self, mode: Mode) -> bool {
        self.current == mode
    }

    /// Any mode can follow any other. Entering `History` always asks for a
    /// refresh, even when it was already active.
    pub fn activate(&mut self, mode: Mode) -> Option<ModeEffect> {
        debug!(from = ?self.current, to = ?mode, "mode change");
        self.current = mode;
        (mode == Mode::History).then_some(ModeEffect::RefreshHistory)
    }
}
