//! Domain types: bars and the market state vocabulary.

pub mod bar;
pub mod state;

pub use bar::{closes, volumes, Bar};
pub use state::{
    Bias, Direction, DivergenceType, MarketState, Momentum, Participation, Positioning,
    PriceDirection, Regime, Tailwind, TrendAlignment,
};
