/// Events emitted by player actions and simulation ticks.
/// The presentation layer consumes these for sound and the message line.

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GameEvent {
    GemCollected { x: i32, y: i32 },
    ExitOpened { x: i32, y: i32 },
    RockPushed { from: (i32, i32), to: (i32, i32) },
    BombDetonated { x: i32, y: i32 },
    CellBlasted { x: i32, y: i32 },
    PlayerCrushed { x: i32, y: i32 },
    PlayerBlasted,
    LevelWon,
    LevelRestarted,
}
