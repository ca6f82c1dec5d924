/// Player and intent types.

/// Movement direction for one discrete step.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum MoveDir {
    Left,
    Right,
    Up,
    Down,
}

impl MoveDir {
    pub const ALL: [MoveDir; 4] = [MoveDir::Left, MoveDir::Right, MoveDir::Up, MoveDir::Down];

    /// Unit vector (dx, dy); y grows downward.
    pub fn delta(self) -> (i32, i32) {
        match self {
            MoveDir::Left  => (-1, 0),
            MoveDir::Right => (1, 0),
            MoveDir::Up    => (0, -1),
            MoveDir::Down  => (0, 1),
        }
    }

    pub fn is_horizontal(self) -> bool {
        matches!(self, MoveDir::Left | MoveDir::Right)
    }
}

/// One discrete player intent, already de-bounced by the input layer.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Intent {
    Move(MoveDir),
    Bomb,
    Restart,
}

#[derive(Clone, Debug)]
pub struct Player {
    pub x: i32,
    pub y: i32,
}

impl Player {
    pub fn new(x: i32, y: i32) -> Self {
        Player { x, y }
    }

    pub fn pos(&self) -> (i32, i32) {
        (self.x, self.y)
    }
}
