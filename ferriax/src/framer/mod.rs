//! Tagged frames for a front-end.
//!
//! Each frame is `DATA_BEGIN body DATA_END`, where the body is
//! `<format>:<payload>` for format tags and `<channel>#<payload>` for channel
//! tags. Marker bytes inside the body are preceded by `DATA_ESCAPE`.

mod emitter;
mod frame;

pub use emitter::FrameEmitter;
pub use frame::{ChannelTag, DATA_BEGIN, DATA_END, DATA_ESCAPE, FormatTag, Frame, Tag};
