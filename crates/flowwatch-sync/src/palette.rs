use flowwatch_core::types::{NodeStatus, RunStatus};

/// A 24-bit color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const fn from_hex(hex: u32) -> Self {
        Self((hex >> 16) as u8, (hex >> 8) as u8, hex as u8)
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

/// The four palette buckets every status falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tone {
    Pending,
    Running,
    Success,
    Failed,
}

impl Tone {
    pub fn of_node(status: &NodeStatus) -> Self {
        match status {
            NodeStatus::Running => Tone::Running,
            NodeStatus::Success => Tone::Success,
            NodeStatus::Failed => Tone::Failed,
            NodeStatus::Pending | NodeStatus::Other(_) => Tone::Pending,
        }
    }

    pub fn of_run(status: &RunStatus) -> Self {
        match status {
            RunStatus::Running => Tone::Running,
            RunStatus::Completed => Tone::Success,
            RunStatus::Failed => Tone::Failed,
            RunStatus::Pending | RunStatus::Other(_) => Tone::Pending,
        }
    }

    pub fn background(self) -> Rgb {
        match self {
            Tone::Success => Rgb::from_hex(0xd1fae5),
            Tone::Running => Rgb::from_hex(0xdbeafe),
            Tone::Failed => Rgb::from_hex(0xfee2e2),
            Tone::Pending => Rgb::from_hex(0xf3f4f6),
        }
    }

    pub fn border(self) -> Rgb {
        match self {
            Tone::Success => Rgb::from_hex(0x10b981),
            Tone::Running => Rgb::from_hex(0x3b82f6),
            Tone::Failed => Rgb::from_hex(0xef4444),
            Tone::Pending => Rgb::from_hex(0x9ca3af),
        }
    }
}

/// Visual description of one graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StyleToken {
    pub tone: Tone,
    pub background: Rgb,
    pub border: Rgb,
    pub border_width: u8,
    /// Glow radius, if the node glows.
    pub glow: Option<u8>,
}

const BORDER_WIDTH: u8 = 2;
const HIGHLIGHT_BORDER_WIDTH: u8 = 4;
const RUNNING_GLOW: u8 = 10;
const HIGHLIGHT_GLOW: u8 = 20;

/// Style for a node in `status`. Total: unknown statuses get the pending token.
pub fn style_for(status: &NodeStatus, highlighted: bool) -> StyleToken {
    let tone = Tone::of_node(status);
    let glow = if highlighted {
        Some(HIGHLIGHT_GLOW)
    } else if tone == Tone::Running {
        Some(RUNNING_GLOW)
    } else {
        None
    };

    StyleToken {
        tone,
        background: tone.background(),
        border: tone.border(),
        border_width: if highlighted {
            HIGHLIGHT_BORDER_WIDTH
        } else {
            BORDER_WIDTH
        },
        glow,
    }
}

/// Style for a node that has no execution in the current snapshot.
pub fn unexecuted() -> StyleToken {
    style_for(&NodeStatus::Pending, false)
}
