use core::fmt::Write;

use crate::error::{Error, Result};
use crate::pipeline::Output;

pub struct SerialOutput<W> {
    tx: W,
}

impl<W> SerialOutput<W>
where
    W: Write,
{
    pub fn new(tx: W) -> Self {
        SerialOutput { tx }
    }
}

impl<W> Output for SerialOutput<W>
where
    W: Write,
{
    fn send(&mut self, text: &str) -> Result<()> {
        self.tx.write_str(text).map_err(|_| Error::Comm)
    }
}
