//! Wire types exchanged with the scoring server and handed to views.

pub mod batch;
pub mod heats;
pub mod score;
