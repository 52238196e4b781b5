use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// One of the two seats at the table.
///
/// On the wire a player is the integer `1` or `2`; "nobody" is `0`
/// (see [`optional`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Player {
    #[default]
    One,
    Two,
}

impl Player {
    pub const ALL: [Player; 2] = [Player::One, Player::Two];

    /// The opponent.
    pub fn other(self) -> Self {
        match self {
            Self::One => Self::Two,
            Self::Two => Self::One,
        }
    }

    /// 0-based slot into per-player arrays such as scores.
    pub fn index(self) -> usize {
        match self {
            Self::One => 0,
            Self::Two => 1,
        }
    }

    /// Wire number (1 or 2).
    pub fn number(self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(Self::One),
            2 => Some(Self::Two),
            _ => None,
        }
    }
}

impl std::fmt::Display for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "player {}", self.number())
    }
}

impl Serialize for Player {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.number())
    }
}

impl<'de> Deserialize<'de> for Player {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let n = u8::deserialize(deserializer)?;
        Player::from_number(n)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid player number {n}")))
    }
}

/// Serde adapter for `Option<Player>` where `None` is written as `0`.
///
/// Use with `#[serde(with = "cueball_core::player::optional")]`.
pub mod optional {
    use super::Player;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Player>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(value.map(Player::number).unwrap_or(0))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Player>, D::Error> {
        let n = u8::deserialize(deserializer)?;
        match n {
            0 => Ok(None),
            n => Player::from_number(n)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid player number {n}"))),
        }
    }
}
