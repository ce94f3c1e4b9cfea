use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::types::{Channel, Message};

/// Replies longer than this are clipped before they enter the window
const MAX_REPLY_CHARS: usize = 2000;

/// One user turn and the reply it got
#[derive(Debug, Clone)]
pub struct Exchange {
    pub user: String,
    pub reply: String,
}

/// Rolling window of recent exchanges for one conversation
#[derive(Debug, Clone)]
pub struct Session {
    exchanges: VecDeque<Exchange>,
    max_exchanges: usize,
}

impl Session {
    pub fn new(max_exchanges: usize) -> Self {
        Self {
            exchanges: VecDeque::with_capacity(max_exchanges),
            max_exchanges,
        }
    }

    /// Record an exchange, evicting the oldest once the window is full
    pub fn push(&mut self, user: &str, reply: &str) {
        if self.max_exchanges == 0 {
            return;
        }
        while self.exchanges.len() >= self.max_exchanges {
            self.exchanges.pop_front();
        }
        let reply = if reply.chars().count() > MAX_REPLY_CHARS {
            let clipped: String = reply.chars().take(MAX_REPLY_CHARS).collect();
            format!("{clipped}…")
        } else {
            reply.to_string()
        };
        self.exchanges.push_back(Exchange {
            user: user.to_string(),
            reply,
        });
    }

    /// Flatten the window into alternating user/assistant messages
    pub fn messages(&self) -> Vec<Message> {
        self.exchanges
            .iter()
            .flat_map(|e| [Message::user(&e.user), Message::assistant(&e.reply)])
            .collect()
    }

    pub fn exchanges(&self) -> impl Iterator<Item = &Exchange> {
        self.exchanges.iter()
    }

    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    pub fn clear(&mut self) {
        self.exchanges.clear();
    }
}

/// Identifies one conversation: a chat id on Telegram, `local` on the terminal
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub channel: Channel,
    pub conversation: String,
}

/// Per-conversation sessions. The lock is only held to copy or update a window.
pub struct SessionStore {
    sessions: Mutex<HashMap<SessionKey, Session>>,
    max_exchanges: usize,
}

impl SessionStore {
    pub fn new(max_exchanges: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            max_exchanges,
        }
    }

    pub fn history(&self, key: &SessionKey) -> Vec<Message> {
        let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.get(key).map(Session::messages).unwrap_or_default()
    }

    pub fn record(&self, key: &SessionKey, user: &str, reply: &str) {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions
            .entry(key.clone())
            .or_insert_with(|| Session::new(self.max_exchanges))
            .push(user, reply);
    }

    pub fn clear(&self, key: &SessionKey) {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.remove(key);
    }

    pub fn len(&self, key: &SessionKey) -> usize {
        let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.get(key).map(Session::len).unwrap_or(0)
    }
}
