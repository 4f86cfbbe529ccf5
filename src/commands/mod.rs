use crate::discord::{Data, Error};

mod channels;
mod info;

pub use channels::*;
pub use info::*;

pub fn list() -> Vec<poise::Command<Data, Error>> {
    vec![about(), status(), channels(), reload()]
}
