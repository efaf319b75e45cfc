//! Primitive command tags.
//!
//! Tags below [`Command::FIRST_DRAW`] set renderer state; the rest draw.
//! Unknown tags are legal and are carried through untouched.

use std::fmt;

/// The tag that opens every primitive record.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Command(pub u32);

impl Command {
    pub const SET_COLOR: Command = Command(0);
    pub const SET_ARROW_COLOR: Command = Command(1);
    pub const SET_TEXTURE: Command = Command(2);
    pub const SET_TRANSFORM: Command = Command(3);
    pub const SET_RENDER_FLAGS: Command = Command(4);
    pub const SET_ARROW_SIZE: Command = Command(5);
    pub const SET_TEXT_SCALE: Command = Command(6);
    /// Opens (non-zero id) or closes (id 0) a named group of persistent primitives.
    pub const BLOCK_INFO: Command = Command(7);

    pub const LINE: Command = Command(8);
    pub const GRADIENT_LINE: Command = Command(9);
    pub const RAY: Command = Command(10);
    pub const THICK_RAY: Command = Command(11);
    pub const POINT: Command = Command(12);
    pub const TRIANGLE: Command = Command(13);
    pub const GRADIENT_TRIANGLE: Command = Command(14);
    pub const BOUND: Command = Command(15);
    pub const SPHERE: Command = Command(16);
    pub const CAPSULE: Command = Command(17);
    pub const CYLINDER: Command = Command(18);
    pub const PLANE: Command = Command(19);
    pub const AXES: Command = Command(20);
    pub const ARC: Command = Command(21);
    pub const TEXT: Command = Command(22);
    pub const MESSAGE: Command = Command(23);
    pub const CREATE_TRIANGLE_MESH: Command = Command(24);
    pub const RENDER_TRIANGLE_MESH_INSTANCES: Command = Command(25);
    pub const RELEASE_TRIANGLE_MESH: Command = Command(26);

    /// First drawing tag.
    pub const FIRST_DRAW: Command = Command::LINE;

    /// Returns true for tags that change renderer state instead of drawing.
    ///
    /// These are retained ahead of any surviving geometry so that a freshly
    /// attached renderer starts from the right color, transform and so on.
    pub fn is_state(self) -> bool {
        self < Self::FIRST_DRAW
    }

    /// Returns true for tags whose payload ends in UTF-8 text.
    ///
    /// Their layout is `word_count | words[word_count] | text`.
    pub fn carries_text(self) -> bool {
        matches!(self, Command::TEXT | Command::MESSAGE)
    }

    /// Human-readable name, or `"UNKNOWN"`.
    pub fn name(self) -> &'static str {
        match self {
            Command::SET_COLOR => "SET_COLOR",
            Command::SET_ARROW_COLOR => "SET_ARROW_COLOR",
            Command::SET_TEXTURE => "SET_TEXTURE",
            Command::SET_TRANSFORM => "SET_TRANSFORM",
            Command::SET_RENDER_FLAGS => "SET_RENDER_FLAGS",
            Command::SET_ARROW_SIZE => "SET_ARROW_SIZE",
            Command::SET_TEXT_SCALE => "SET_TEXT_SCALE",
            Command::BLOCK_INFO => "BLOCK_INFO",
            Command::LINE => "LINE",
            Command::GRADIENT_LINE => "GRADIENT_LINE",
            Command::RAY => "RAY",
            Command::THICK_RAY => "THICK_RAY",
            Command::POINT => "POINT",
            Command::TRIANGLE => "TRIANGLE",
            Command::GRADIENT_TRIANGLE => "GRADIENT_TRIANGLE",
            Command::BOUND => "BOUND",
            Command::SPHERE => "SPHERE",
            Command::CAPSULE => "CAPSULE",
            Command::CYLINDER => "CYLINDER",
            Command::PLANE => "PLANE",
            Command::AXES => "AXES",
            Command::ARC => "ARC",
            Command::TEXT => "TEXT",
            Command::MESSAGE => "MESSAGE",
            Command::CREATE_TRIANGLE_MESH => "CREATE_TRIANGLE_MESH",
            Command::RENDER_TRIANGLE_MESH_INSTANCES => "RENDER_TRIANGLE_MESH_INSTANCES",
            Command::RELEASE_TRIANGLE_MESH => "RELEASE_TRIANGLE_MESH",
            _ => "UNKNOWN",
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.0)
    }
}

impl From<u32> for Command {
    fn from(tag: u32) -> Self {
        Command(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_allowlist() {
        for tag in 0..=7 {
            assert!(Command(tag).is_state(), "tag {tag} should set state");
        }
        assert!(!Command::LINE.is_state());
        assert!(!Command::TEXT.is_state());
        assert!(!Command(999).is_state());
    }

    #[test]
    fn unknown_tags_have_a_name() {
        assert_eq!(Command(999).name(), "UNKNOWN");
        assert_eq!(format!("{:?}", Command::BLOCK_INFO), "BLOCK_INFO(7)");
    }
}
