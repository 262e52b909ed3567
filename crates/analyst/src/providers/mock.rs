use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::sync::{Arc, Mutex};

use super::base::{FragmentStream, Provider};
use crate::models::fragment::StreamFragment;
use crate::models::message::Message;
use crate::models::tool::Tool;

/// One scripted model turn
pub enum MockTurn {
    /// Stream these fragments, then end normally
    Fragments(Vec<StreamFragment>),
    /// Stream these fragments, then fail with the given error
    FailAfter(Vec<StreamFragment>, String),
    /// Stream these fragments, then never yield again
    Hang(Vec<StreamFragment>),
    /// Refuse to open the stream at all
    Refuse(String),
}

/// A mock provider that replays pre-configured turns for testing
pub struct MockProvider {
    turns: Arc<Mutex<Vec<MockTurn>>>,
    requests: Arc<Mutex<Vec<Vec<Message>>>>,
}

impl MockProvider {
    pub fn new(turns: Vec<MockTurn>) -> Self {
        Self {
            turns: Arc::new(Mutex::new(turns)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// The history the provider was called with, once per turn
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn stream(&self, messages: &[Message], _tools: &[Tool]) -> Result<FragmentStream> {
        self.requests.lock().unwrap().push(messages.to_vec());

        let turn = {
            let mut turns = self.turns.lock().unwrap();
            if turns.is_empty() {
                // Return an empty response if no more turns are configured
                MockTurn::Fragments(vec![StreamFragment::text("")])
            } else {
                turns.remove(0)
            }
        };

        let stream: FragmentStream = match turn {
            MockTurn::Fragments(fragments) => stream::iter(fragments.into_iter().map(Ok)).boxed(),
            MockTurn::FailAfter(fragments, error) => stream::iter(fragments.into_iter().map(Ok))
                .chain(stream::once(async move { Err(anyhow!(error)) }))
                .boxed(),
            MockTurn::Hang(fragments) => stream::iter(fragments.into_iter().map(Ok))
                .chain(stream::pending())
                .boxed(),
            MockTurn::Refuse(error) => return Err(anyhow!(error)),
        };
        Ok(stream)
    }
}
