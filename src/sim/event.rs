/// Events emitted during a session tick.
/// The presentation layer consumes these for HUD updates and effects.

/// Summary of a finished run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RunResult {
    pub elapsed_seconds: f32,
    pub coins: u32,
    pub victory: bool,
    pub lives_remaining: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub enum GameEvent {
    Jumped,
    Landed,
    BumpedHead,
    CoinCollected { index: usize, total: u32 },
    SpikeHit,
    FellOut,
    LifeLost { lives_left: u32 },
    Finished(RunResult),
}
