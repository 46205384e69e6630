//! In-room chat over the broadcast transport

pub mod filter;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::net::protocol::{RpcCall, RpcTarget};
use crate::net::transport::{Transport, TransportError};
use crate::util::rate_limit::ChatRateLimiter;

pub use filter::{TextCheckMode, TextCheckResult, TextFilter, WordListFilter};

/// One line in the chat log
#[derive(Debug, Clone, PartialEq)]
pub struct ChatLine {
    /// None for notices about the channel itself
    pub from: Option<String>,
    pub text: String,
    pub received_at: DateTime<Utc>,
}

impl std::fmt::Display for ChatLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.from {
            Some(from) => write!(f, "{} : {}", from, self.text),
            None => f.write_str(&self.text),
        }
    }
}

/// Chat errors
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Text rejected by filter: {0:?}")]
    Rejected(TextCheckResult),

    #[error("Sending too fast")]
    RateLimited,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Generated nickname for players who did not pick one
pub fn default_nickname() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("Player_{}", &id[..8])
}

pub struct ChatChannel {
    nickname: String,
    filter: Box<dyn TextFilter>,
    limiter: ChatRateLimiter,
    lines: Vec<ChatLine>,
}

impl ChatChannel {
    pub fn new(nickname: Option<String>, messages_per_second: u32) -> Self {
        Self::with_filter(nickname, messages_per_second, Box::new(WordListFilter::default()))
    }

    pub fn with_filter(
        nickname: Option<String>,
        messages_per_second: u32,
        filter: Box<dyn TextFilter>,
    ) -> Self {
        let mut channel = Self {
            nickname: default_nickname(),
            filter,
            limiter: ChatRateLimiter::new(messages_per_second),
            lines: Vec::new(),
        };
        if let Some(name) = nickname {
            if let Err(e) = channel.set_nickname(&name) {
                warn!(nickname = %name, error = %e, "Configured nickname refused, using generated one");
            }
        }
        channel
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    pub fn lines(&self) -> &[ChatLine] {
        &self.lines
    }

    pub fn set_nickname(&mut self, name: &str) -> Result<(), ChatError> {
        let verdict = self.filter.check(name, TextCheckMode::Nickname);
        if !verdict.is_valid() {
            return Err(ChatError::Rejected(verdict));
        }
        self.nickname = name.to_string();
        Ok(())
    }

    /// Filter, rate limit and broadcast a line, then log it locally
    pub fn send(&mut self, text: &str, transport: &dyn Transport) -> Result<(), ChatError> {
        let verdict = self.filter.check(text, TextCheckMode::Chat);
        if !verdict.is_valid() {
            return Err(ChatError::Rejected(verdict));
        }
        if !self.limiter.check() {
            return Err(ChatError::RateLimited);
        }

        transport.broadcast(
            RpcTarget::All,
            RpcCall::Chat {
                from: self.nickname.clone(),
                text: text.to_string(),
            },
        )?;
        let from = self.nickname.clone();
        self.receive(from, text.to_string());
        Ok(())
    }

    /// A line arrived (or was sent by this peer)
    pub fn receive(&mut self, from: String, text: String) {
        self.push(Some(from), text);
    }

    /// Channel notice such as a member entering or leaving
    pub fn notice(&mut self, text: String) {
        self.push(None, text);
    }

    /// Forget the log, as when leaving the room
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    fn push(&mut self, from: Option<String>, text: String) {
        let line = ChatLine {
            from,
            text,
            received_at: Utc::now(),
        };
        info!(line = %line, "Chat");
        self.lines.push(line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::loopback::LoopbackHub;
    use crate::net::protocol::RoomOptions;
    use crate::net::transport::TransportEvent;

    #[test]
    fn generated_nickname_has_eight_hex_digits() {
        let name = default_nickname();
        let suffix = name.strip_prefix("Player_").unwrap();
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn refused_nickname_falls_back_to_generated() {
        let channel = ChatChannel::new(Some("bad_name".to_string()), 2);
        assert!(channel.nickname().starts_with("Player_"));

        let channel = ChatChannel::new(Some("에이스".to_string()), 2);
        assert_eq!(channel.nickname(), "에이스");
    }

    #[test]
    fn sent_lines_reach_the_other_peer_and_the_local_log() {
        let hub = LoopbackHub::new("eu");
        let a = hub.add_peer();
        let b = hub.add_peer();
        a.connect().unwrap();
        b.connect().unwrap();
        a.create_room("Room 2", RoomOptions::default()).unwrap();
        b.join_random_room().unwrap();
        while b.poll_event().is_some() {}

        let mut chat = ChatChannel::new(Some("alice".to_string()), 2);
        chat.send("gl hf", &a).unwrap();
        assert_eq!(chat.lines().len(), 1);
        assert_eq!(chat.lines()[0].to_string(), "alice : gl hf");

        let delivered = std::iter::from_fn(|| b.poll_event()).any(|event| {
            let expected = RpcCall::Chat {
                from: "alice".into(),
                text: "gl hf".into(),
            };
            matches!(event, TransportEvent::Rpc(env) if env.call == expected)
        });
        assert!(delivered);
    }

    #[test]
    fn notices_have_no_sender_and_clear_empties_the_log() {
        let mut chat = ChatChannel::new(None, 2);
        chat.notice("Entered to Channel (Room 4)".to_string());
        chat.receive("bob".to_string(), "hi".to_string());
        assert_eq!(chat.lines()[0].to_string(), "Entered to Channel (Room 4)");
        assert_eq!(chat.lines()[1].to_string(), "bob : hi");

        chat.clear();
        assert!(chat.lines().is_empty());
    }

    #[test]
    fn censored_and_flooded_lines_are_refused() {
        let hub = LoopbackHub::new("eu");
        let a = hub.add_peer();
        a.connect().unwrap();
        a.create_room("Room 2", RoomOptions::default()).unwrap();

        let mut chat = ChatChannel::new(None, 1);
        assert!(matches!(
            chat.send("shit", &a),
            Err(ChatError::Rejected(TextCheckResult::Censored))
        ));
        chat.send("one", &a).unwrap();
        assert!(matches!(chat.send("two", &a), Err(ChatError::RateLimited)));
        assert_eq!(chat.lines().len(), 1);
    }
}
