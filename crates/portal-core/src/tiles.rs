//! Placement of the media tiles on the call grid.
//!
//! The grid is two columns by three rows. Where each tile goes depends only
//! on whether the chat panel is open and which second tiles exist.

use crate::state::{CallState, TrackSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileInputs {
    pub chat_open: bool,
    pub agent_state: CallState,
    pub agent_video: bool,
    pub camera_enabled: bool,
    pub screen_share_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentTile {
    /// The agent publishes video.
    Avatar,
    /// Audio only; drawn as a visualizer driven by the call state.
    Audio(CallState),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Start,
    Center,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileSize {
    Compact,
    Full,
}

/// A cell range on the grid. Columns and rows are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub col: u16,
    pub row: u16,
    pub col_span: u16,
    pub row_span: u16,
    pub align: Align,
}

impl Placement {
    const fn cell(col: u16, row: u16, align: Align) -> Self {
        Self {
            col,
            row,
            col_span: 1,
            row_span: 1,
            align,
        }
    }
}

pub const GRID_COLUMNS: u16 = 2;
pub const GRID_ROWS: u16 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileLayout {
    pub agent: AgentTile,
    pub agent_placement: Placement,
    pub agent_size: TileSize,
    /// Local tiles, camera before screen share.
    pub second: Vec<TrackSource>,
    pub second_placement: Option<Placement>,
}

pub fn layout(inputs: TileInputs) -> TileLayout {
    let agent = if inputs.agent_video {
        AgentTile::Avatar
    } else {
        AgentTile::Audio(inputs.agent_state)
    };

    let mut second = Vec::new();
    if inputs.camera_enabled {
        second.push(TrackSource::Camera);
    }
    if inputs.screen_share_enabled {
        second.push(TrackSource::ScreenShare);
    }
    let has_second = !second.is_empty();

    let (agent_placement, second_placement) = match (inputs.chat_open, has_second) {
        (false, _) => (
            Placement {
                col: 1,
                row: 1,
                col_span: GRID_COLUMNS,
                row_span: GRID_ROWS,
                align: Align::Center,
            },
            Some(Placement::cell(2, 3, Align::End)),
        ),
        (true, true) => (
            Placement::cell(1, 1, Align::End),
            Some(Placement::cell(2, 1, Align::Start)),
        ),
        (true, false) => (
            Placement {
                col_span: 2,
                ..Placement::cell(1, 1, Align::Center)
            },
            None,
        ),
    };

    TileLayout {
        agent,
        agent_placement,
        agent_size: if inputs.chat_open {
            TileSize::Compact
        } else {
            TileSize::Full
        },
        second_placement: if has_second { second_placement } else { None },
        second,
    }
}
