//! Terminal styles, named by what they mark.

use std::fmt::Display;

use console::{style, StyledObject};

pub fn phase_active(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).bright().yellow()
}

pub fn phase_done(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).bright().green()
}

pub fn alert(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).bright().red()
}

pub fn heading(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).bright().underlined()
}

pub fn muted(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).dim()
}

pub fn title(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).magenta().bold()
}
