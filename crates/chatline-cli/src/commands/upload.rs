//! /upload command - send a local file to the backend

use super::CommandResult;
use std::path::PathBuf;

pub struct UploadCommand;

impl UploadCommand {
    pub fn execute(args: &str) -> CommandResult {
        if args.is_empty() {
            return CommandResult::Message("Usage: /upload <path>".to_string());
        }
        CommandResult::Upload(expand_home(args))
    }
}

/// Expand a leading `~/` to the home directory
fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_home_expansion() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/a.txt"), home.join("a.txt"));
        }
        assert_eq!(expand_home("/tmp/a.txt"), PathBuf::from("/tmp/a.txt"));
        assert_eq!(expand_home("a~/b"), PathBuf::from("a~/b"));
    }
}
