//! /transcript command - print the conversation so far

use chatline_api::{ContentType, Message};

pub struct TranscriptCommand;

impl TranscriptCommand {
    pub fn render(messages: &[Message]) -> String {
        if messages.is_empty() {
            return "No messages yet.".to_string();
        }

        let mut output = String::new();
        for msg in messages {
            let time = msg.timestamp.with_timezone(&chrono::Local).format("%H:%M");
            let kind = match msg.content_type {
                ContentType::FileRef => "[file] ",
                ContentType::Text => "",
            };
            let marker = if msg.error && !msg.content.starts_with("[Error:") {
                " (failed)"
            } else {
                ""
            };
            output.push_str(&format!(
                "[{}] {:<7} {}{}{}\n",
                time,
                msg.sender.label(),
                kind,
                msg.content,
                marker
            ));
        }
        output.pop();
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_empty_transcript() {
        assert_eq!(TranscriptCommand::render(&[]), "No messages yet.");
    }

    #[test]
    fn test_renders_each_message_on_a_line() {
        let now = Utc::now();
        let mut failed_upload = Message::file_notice("Upload failed: scan.pdf.", now);
        failed_upload.error = true;
        let mut reply = Message::placeholder(now);
        reply.content = "[Error: Request aborted]".into();
        reply.error = true;

        let text = TranscriptCommand::render(&[Message::user("Hello", now), reply, failed_upload]);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with("you     Hello"));
        assert!(lines[1].ends_with("ai      [Error: Request aborted]"));
        assert!(lines[2].ends_with("system  [file] Upload failed: scan.pdf. (failed)"));
    }
}
