pub mod models;

pub use models::{
    GameForecast, GameOdds, Matchup, MatchupKey, MoneylineQuote, OverUnderQuote, Side, TeamId,
    TotalSide,
};
