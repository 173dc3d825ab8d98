//! Tagged frames and their wire encoding.

use std::fmt;
use std::str::FromStr;

use bytes::{BufMut, Bytes, BytesMut};
use memchr::memchr3_iter;

use crate::error::FrameError;

/// Starts every frame.
pub const DATA_BEGIN: u8 = 0x02;
/// Ends every frame.
pub const DATA_END: u8 = 0x05;
/// Precedes a marker byte that is part of the body.
pub const DATA_ESCAPE: u8 = 0x1b;

/// What kind of content a format-tagged frame carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatTag {
    Verbatim,
    Math,
    Markup,
    Postscript,
    Scheme,
    CommandEcho,
}

impl FormatTag {
    pub const ALL: [FormatTag; 6] = [
        FormatTag::Verbatim,
        FormatTag::Math,
        FormatTag::Markup,
        FormatTag::Postscript,
        FormatTag::Scheme,
        FormatTag::CommandEcho,
    ];

    /// Name used on the wire.
    pub fn wire_name(self) -> &'static str {
        match self {
            FormatTag::Verbatim => "verbatim",
            FormatTag::Math => "latex",
            FormatTag::Markup => "html",
            FormatTag::Postscript => "ps",
            FormatTag::Scheme => "scheme",
            FormatTag::CommandEcho => "command",
        }
    }
}

/// Which front-end stream a channel-tagged frame belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelTag {
    Output,
    Prompt,
    Input,
    Error,
    Status,
}

impl ChannelTag {
    pub const ALL: [ChannelTag; 5] = [
        ChannelTag::Output,
        ChannelTag::Prompt,
        ChannelTag::Input,
        ChannelTag::Error,
        ChannelTag::Status,
    ];

    /// Name used on the wire.
    pub fn wire_name(self) -> &'static str {
        match self {
            ChannelTag::Output => "output",
            ChannelTag::Prompt => "prompt",
            ChannelTag::Input => "input",
            ChannelTag::Error => "error",
            ChannelTag::Status => "status",
        }
    }
}

/// A frame tag: exactly one of the two namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Format(FormatTag),
    Channel(ChannelTag),
}

impl Tag {
    /// Name used on the wire.
    pub fn wire_name(self) -> &'static str {
        match self {
            Tag::Format(tag) => tag.wire_name(),
            Tag::Channel(tag) => tag.wire_name(),
        }
    }

    /// Separator between the tag and the payload in the frame body.
    fn separator(self) -> u8 {
        match self {
            Tag::Format(_) => b':',
            Tag::Channel(_) => b'#',
        }
    }
}

impl From<FormatTag> for Tag {
    fn from(tag: FormatTag) -> Self {
        Tag::Format(tag)
    }
}

impl From<ChannelTag> for Tag {
    fn from(tag: ChannelTag) -> Self {
        Tag::Channel(tag)
    }
}

impl FromStr for Tag {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(tag) = FormatTag::ALL.iter().find(|t| t.wire_name() == s) {
            return Ok(Tag::Format(*tag));
        }
        if let Some(tag) = ChannelTag::ALL.iter().find(|t| t.wire_name() == s) {
            return Ok(Tag::Channel(*tag));
        }
        Err(FrameError::UnknownTag(s.to_string()))
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// A tagged unit of output for a front-end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    tag: Tag,
    payload: String,
}

impl Frame {
    /// Create a frame.
    pub fn new(tag: impl Into<Tag>, payload: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            payload: payload.into(),
        }
    }

    /// Create a frame from a tag name, failing for unknown names.
    pub fn named(tag: &str, payload: impl Into<String>) -> Result<Self, FrameError> {
        Ok(Self::new(tag.parse::<Tag>()?, payload))
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Encode as `DATA_BEGIN body DATA_END` with marker bytes in the body
    /// escaped.
    pub fn encode(&self) -> Bytes {
        let name = self.tag.wire_name().as_bytes();
        let payload = self.payload.as_bytes();

        let mut out = BytesMut::with_capacity(name.len() + payload.len() + 8);
        out.put_u8(DATA_BEGIN);
        out.put_slice(name);
        out.put_u8(self.tag.separator());
        put_escaped(&mut out, payload);
        out.put_u8(DATA_END);
        out.freeze()
    }
}

fn put_escaped(out: &mut BytesMut, data: &[u8]) {
    let mut last = 0;
    for pos in memchr3_iter(DATA_BEGIN, DATA_END, DATA_ESCAPE, data) {
        out.put_slice(&data[last..pos]);
        out.put_u8(DATA_ESCAPE);
        out.put_u8(data[pos]);
        last = pos + 1;
    }
    out.put_slice(&data[last..]);
}
