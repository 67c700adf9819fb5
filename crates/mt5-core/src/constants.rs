//! Terminal enumerations and trade return codes.
//!
//! The binding speaks integer codes; these enums give them names. Native
//! structs keep the raw integers so that unknown codes survive a round trip.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Trade server return codes.
pub mod retcode {
    pub const REQUOTE: u32 = 10004;
    pub const REJECT: u32 = 10006;
    pub const CANCEL: u32 = 10007;
    pub const PLACED: u32 = 10008;
    pub const DONE: u32 = 10009;
    pub const DONE_PARTIAL: u32 = 10010;
    pub const ERROR: u32 = 10011;
    pub const TIMEOUT: u32 = 10012;
    pub const INVALID: u32 = 10013;
    pub const INVALID_VOLUME: u32 = 10014;
    pub const INVALID_PRICE: u32 = 10015;
    pub const INVALID_STOPS: u32 = 10016;
    pub const TRADE_DISABLED: u32 = 10017;
    pub const MARKET_CLOSED: u32 = 10018;
    pub const NO_MONEY: u32 = 10019;
    pub const PRICE_CHANGED: u32 = 10020;
    pub const PRICE_OFF: u32 = 10021;
    pub const INVALID_EXPIRATION: u32 = 10022;
    pub const ORDER_CHANGED: u32 = 10023;
    pub const TOO_MANY_REQUESTS: u32 = 10024;
    pub const NO_CHANGES: u32 = 10025;
    pub const CONNECTION: u32 = 10031;
    pub const INVALID_FILL: u32 = 10030;
    pub const POSITION_CLOSED: u32 = 10036;

    /// Retcode of a successful `order_check`.
    pub const CHECK_OK: u32 = 0;
}

/// Chart timeframe with the terminal's numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timeframe {
    M1,
    M2,
    M3,
    M4,
    M5,
    M6,
    M10,
    M12,
    M15,
    M20,
    M30,
    H1,
    H2,
    H3,
    H4,
    H6,
    H8,
    H12,
    D1,
    W1,
    MN1,
}

impl Timeframe {
    pub fn code(self) -> u32 {
        match self {
            Self::M1 => 1,
            Self::M2 => 2,
            Self::M3 => 3,
            Self::M4 => 4,
            Self::M5 => 5,
            Self::M6 => 6,
            Self::M10 => 10,
            Self::M12 => 12,
            Self::M15 => 15,
            Self::M20 => 20,
            Self::M30 => 30,
            Self::H1 => 16385,
            Self::H2 => 16386,
            Self::H3 => 16387,
            Self::H4 => 16388,
            Self::H6 => 16390,
            Self::H8 => 16392,
            Self::H12 => 16396,
            Self::D1 => 16408,
            Self::W1 => 32769,
            Self::MN1 => 49153,
        }
    }

    /// Parse a granularity suffix such as `"M1"` or `"h4"`.
    pub fn from_granularity(granularity: &str) -> Option<Self> {
        let tf = match granularity.to_ascii_uppercase().as_str() {
            "M1" => Self::M1,
            "M2" => Self::M2,
            "M3" => Self::M3,
            "M4" => Self::M4,
            "M5" => Self::M5,
            "M6" => Self::M6,
            "M10" => Self::M10,
            "M12" => Self::M12,
            "M15" => Self::M15,
            "M20" => Self::M20,
            "M30" => Self::M30,
            "H1" => Self::H1,
            "H2" => Self::H2,
            "H3" => Self::H3,
            "H4" => Self::H4,
            "H6" => Self::H6,
            "H8" => Self::H8,
            "H12" => Self::H12,
            "D1" => Self::D1,
            "W1" => Self::W1,
            "MN1" => Self::MN1,
            _ => return None,
        };
        Some(tf)
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Which ticks `copy_ticks_*` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CopyTicks {
    #[default]
    All,
    Info,
    Trade,
}

impl CopyTicks {
    pub fn code(self) -> i32 {
        match self {
            Self::All => -1,
            Self::Info => 1,
            Self::Trade => 2,
        }
    }
}

impl fmt::Display for CopyTicks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderType {
    Buy,
    Sell,
    BuyLimit,
    SellLimit,
    BuyStop,
    SellStop,
    BuyStopLimit,
    SellStopLimit,
    CloseBy,
}

impl OrderType {
    pub fn code(self) -> i64 {
        match self {
            Self::Buy => 0,
            Self::Sell => 1,
            Self::BuyLimit => 2,
            Self::SellLimit => 3,
            Self::BuyStop => 4,
            Self::SellStop => 5,
            Self::BuyStopLimit => 6,
            Self::SellStopLimit => 7,
            Self::CloseBy => 8,
        }
    }
}

/// Order filling policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderFilling {
    Fok,
    #[default]
    Ioc,
    Return,
}

impl OrderFilling {
    pub fn code(self) -> i64 {
        match self {
            Self::Fok => 0,
            Self::Ioc => 1,
            Self::Return => 2,
        }
    }
}

/// Order lifetime policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderTime {
    #[default]
    Gtc,
    Day,
    Specified,
    SpecifiedDay,
}

impl OrderTime {
    pub fn code(self) -> i64 {
        match self {
            Self::Gtc => 0,
            Self::Day => 1,
            Self::Specified => 2,
            Self::SpecifiedDay => 3,
        }
    }
}

/// Trade request action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TradeAction {
    Deal,
    Pending,
    Sltp,
    Modify,
    Remove,
    CloseBy,
}

impl TradeAction {
    pub fn code(self) -> i64 {
        match self {
            Self::Deal => 1,
            Self::Pending => 5,
            Self::Sltp => 6,
            Self::Modify => 7,
            Self::Remove => 8,
            Self::CloseBy => 10,
        }
    }
}

/// Direction of an open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PositionType {
    Buy,
    Sell,
}

impl PositionType {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Buy),
            1 => Some(Self::Sell),
            _ => None,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Self::Buy => 0,
            Self::Sell => 1,
        }
    }
}

/// Deal type. Only the variants the bridge reasons about are named.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DealType {
    Buy,
    Sell,
    Balance,
    Credit,
    Charge,
    Correction,
    Bonus,
    Commission,
    Other(i64),
}

impl DealType {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Self::Buy,
            1 => Self::Sell,
            2 => Self::Balance,
            3 => Self::Credit,
            4 => Self::Charge,
            5 => Self::Correction,
            6 => Self::Bonus,
            7 => Self::Commission,
            other => Self::Other(other),
        }
    }

    /// Buy or sell deal (as opposed to balance operations, fees, ...).
    pub fn is_trade(self) -> bool {
        matches!(self, Self::Buy | Self::Sell)
    }
}

/// Whether a deal opened or closed exposure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DealEntry {
    In,
    Out,
    InOut,
    OutBy,
}

impl DealEntry {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::In),
            1 => Some(Self::Out),
            2 => Some(Self::InOut),
            3 => Some(Self::OutBy),
            _ => None,
        }
    }
}

/// Order side: buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Returns the opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }

    /// Returns 1.0 for buy, -1.0 for sell.
    pub fn sign(&self) -> f64 {
        match self {
            Self::Buy => 1.0,
            Self::Sell => -1.0,
        }
    }

    /// Market order type for this side.
    pub fn order_type(&self) -> OrderType {
        match self {
            Self::Buy => OrderType::Buy,
            Self::Sell => OrderType::Sell,
        }
    }
}

impl From<PositionType> for OrderSide {
    fn from(position_type: PositionType) -> Self {
        match position_type {
            PositionType::Buy => Self::Buy,
            PositionType::Sell => Self::Sell,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

impl FromStr for OrderSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BUY" => Ok(Self::Buy),
            "SELL" => Ok(Self::Sell),
            other => Err(format!("unknown order side: {other}")),
        }
    }
}
