use serde::Serialize;

/// What kind of device produced an [`InputEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum InputKind {
    Key = 0,
    Button = 1,
    Axis = 2,
    Pointer = 3,
}

impl InputKind {
    pub fn from_u32(tag: u32) -> Option<Self> {
        match tag {
            0 => Some(InputKind::Key),
            1 => Some(InputKind::Button),
            2 => Some(InputKind::Axis),
            3 => Some(InputKind::Pointer),
            _ => None,
        }
    }
}

/// User input forwarded from a viewer back to the producer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InputEvent {
    pub kind: InputKind,
    /// Key code, button number or axis index.
    pub id: u32,
    pub pressed: bool,
    /// Pointer position, or axis value in `x`.
    pub x: f32,
    pub y: f32,
}

impl InputEvent {
    pub fn key(id: u32, pressed: bool) -> Self {
        Self {
            kind: InputKind::Key,
            id,
            pressed,
            x: 0.0,
            y: 0.0,
        }
    }

    pub fn pointer(x: f32, y: f32) -> Self {
        Self {
            kind: InputKind::Pointer,
            id: 0,
            pressed: false,
            x,
            y,
        }
    }
}
