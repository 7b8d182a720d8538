//! This module aggregates all the command modules for the bot.

/// Commands related to music playback, plus the audio sources and playback utilities behind them.
pub mod music;
