//! Writes frames to a front-end.

use std::io;

use log::trace;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::frame::{ChannelTag, FormatTag, Frame};
use crate::parser::{ProcessedOutput, frontend_prompt};
use crate::session::SessionError;

/// Writes encoded frames to an async writer, flushing after each one.
///
/// The front-end renders frames as they arrive, so nothing is held back.
pub struct FrameEmitter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> FrameEmitter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Write one frame and flush.
    pub async fn emit(&mut self, frame: &Frame) -> io::Result<()> {
        trace!("emit {} frame ({} bytes)", frame.tag(), frame.payload().len());
        self.writer.write_all(&frame.encode()).await?;
        self.writer.flush().await
    }

    /// Emit the banner and first prompt of a freshly started session.
    pub async fn emit_start(&mut self, banner: &str, prompt: &str) -> io::Result<()> {
        self.emit(&Frame::new(FormatTag::Verbatim, banner)).await?;
        self.emit_prompt(prompt).await
    }

    /// Emit one exchange: each math fragment, then the remaining text, then
    /// the next prompt.
    pub async fn emit_exchange(
        &mut self,
        output: &ProcessedOutput,
        prompt: &str,
    ) -> io::Result<()> {
        for math in &output.math {
            self.emit(&Frame::new(FormatTag::Math, math.as_str())).await?;
        }
        self.emit(&Frame::new(FormatTag::Verbatim, output.text.as_str()))
            .await?;
        self.emit_prompt(prompt).await
    }

    /// Emit the prompt in front-end form.
    pub async fn emit_prompt(&mut self, prompt: &str) -> io::Result<()> {
        self.emit(&Frame::new(ChannelTag::Prompt, frontend_prompt(prompt)))
            .await
    }

    /// Emit a recorded session error on the error channel.
    pub async fn emit_session_error(&mut self, error: &SessionError) -> io::Result<()> {
        self.emit(&Frame::new(ChannelTag::Error, error.to_string())).await
    }

    /// Emit a status message.
    pub async fn emit_status(&mut self, message: &str) -> io::Result<()> {
        self.emit(&Frame::new(ChannelTag::Status, message)).await
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}
