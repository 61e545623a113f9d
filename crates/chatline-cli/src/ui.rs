//! Terminal rendering of streamed replies

use chatline_core::{ConversationEvent, SessionState};
use std::io::{self, Write};

/// Prints a reply incrementally as session events arrive
#[derive(Debug, Default)]
pub struct StreamPrinter {
    mid_line: bool,
}

impl StreamPrinter {
    pub fn render(&mut self, event: &ConversationEvent, out: &mut impl Write) -> io::Result<()> {
        match event {
            ConversationEvent::SessionStart { .. } => {}
            ConversationEvent::SessionUpdate { delta, .. } => {
                write!(out, "{}", delta)?;
                out.flush()?;
                self.mid_line = !delta.ends_with('\n');
            }
            ConversationEvent::SessionEnd { state, content, .. } => {
                if self.mid_line {
                    writeln!(out)?;
                }
                // Failed sessions replace any partial text with the error
                if *state == SessionState::Failed {
                    writeln!(out, "{}", content)?;
                }
                out.flush()?;
                self.mid_line = false;
            }
        }
        Ok(())
    }
}
